//! The type domain: primitives, nominal class types, and union types.
//!
//! Types here are always concrete -- there are no inference variables.
//! Inference works by lazily specializing method bodies against
//! concrete argument types, so the only structural operation is
//! building unions.

use std::fmt;

use serde::Serialize;

/// A Garnet type.
///
/// Unions are kept in canonical form: members flattened (a union never
/// directly contains another union), deduplicated, sorted, and at least
/// two long. Build them through [`Type::union`] so equality and hashing
/// behave as set equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Type {
    Nil,
    Bool,
    Int,
    Float,
    Char,
    String,
    Symbol,
    /// A nominal class type, identified by name.
    Class(String),
    /// "Exactly one of these" -- canonical form only.
    Union(Vec<Type>),
}

impl Type {
    /// Build a union from the given members.
    ///
    /// Nested unions are absorbed, duplicates dropped and the member
    /// order canonicalized. A single surviving member is returned as
    /// itself rather than a one-member union.
    pub fn union<I: IntoIterator<Item = Type>>(members: I) -> Type {
        let mut flat = Vec::new();
        for member in members {
            match member {
                Type::Union(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        flat.sort();
        flat.dedup();
        match flat.len() {
            0 => Type::Nil,
            1 => flat.remove(0),
            _ => Type::Union(flat),
        }
    }

    /// The class-registry key used for method lookup on a value of this
    /// type. Unions have no table of their own -- calls on a union
    /// receiver dispatch per member.
    pub fn lookup_name(&self) -> Option<&str> {
        match self {
            Type::Nil => Some("Nil"),
            Type::Bool => Some("Bool"),
            Type::Int => Some("Int"),
            Type::Float => Some("Float"),
            Type::Char => Some("Char"),
            Type::String => Some("String"),
            Type::Symbol => Some("Symbol"),
            Type::Class(name) => Some(name),
            Type::Union(_) => None,
        }
    }

    pub fn is_union(&self) -> bool {
        matches!(self, Type::Union(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
            other => match other.lookup_name() {
                Some(name) => write!(f, "{}", name),
                None => unreachable!(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_of_identical_members_collapses_to_the_member() {
        assert_eq!(Type::union([Type::Int, Type::Int]), Type::Int);
    }

    #[test]
    fn union_is_order_irrelevant() {
        assert_eq!(
            Type::union([Type::Int, Type::Float]),
            Type::union([Type::Float, Type::Int])
        );
    }

    #[test]
    fn union_absorbs_nested_unions() {
        let inner = Type::union([Type::Int, Type::Float]);
        let outer = Type::union([inner.clone(), Type::Char]);
        match &outer {
            Type::Union(members) => {
                assert_eq!(members.len(), 3);
                assert!(members.iter().all(|m| !m.is_union()));
            }
            other => panic!("expected a union, got {other:?}"),
        }
        // Joining a union with one of its members changes nothing.
        assert_eq!(Type::union([outer.clone(), Type::Int]), outer);
    }

    #[test]
    fn union_of_unions_deduplicates() {
        let ab = Type::union([Type::Int, Type::Float]);
        assert_eq!(Type::union([ab.clone(), ab.clone()]), ab);
    }

    #[test]
    fn class_types_compare_by_name() {
        assert_eq!(Type::Class("A".into()), Type::Class("A".into()));
        assert_ne!(Type::Class("A".into()), Type::Class("B".into()));
    }

    #[test]
    fn union_display() {
        let ty = Type::union([Type::Float, Type::Int]);
        assert_eq!(ty.to_string(), "Int | Float");
    }
}
