//! The per-compilation context.
//!
//! Everything the traversal mutates lives here rather than in process
//! globals, so independent compilations cannot observe each other: the
//! top-level method table, the class registry, the named-constant table
//! fed by regex-literal caching, the set of already-required paths, and
//! the fresh-temporary counter. One compilation run is single-threaded;
//! the `RefCell`s are only ever touched by that one traversal.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use garnet_ast::{Def, Node, Type};

use crate::builtins;

/// A method table: method name to its untyped definition. The shared
/// cell lets the instance cache grow while the traversal holds other
/// borrows of the program.
pub type MethodTable = FxHashMap<String, Rc<RefCell<Def>>>;

pub struct Program {
    /// Methods callable without a receiver.
    pub defs: MethodTable,
    /// Class name to that class's own method table. Lookup is one
    /// level: a class only ever consults its own table.
    pub classes: FxHashMap<String, MethodTable>,
    /// Named constants. Regex literals register their constructor call
    /// here exactly once per distinct pattern.
    pub consts: FxHashMap<String, Node>,
    /// Types of constants that have already been inferred.
    pub(crate) const_types: FxHashMap<String, Type>,
    /// Paths already spliced in by `require`.
    pub required: FxHashSet<String>,
    temp_var_count: u32,
}

impl Program {
    /// A fresh context with the builtin classes and methods seeded.
    pub fn new() -> Program {
        let mut program = Program {
            defs: MethodTable::default(),
            classes: FxHashMap::default(),
            consts: FxHashMap::default(),
            const_types: FxHashMap::default(),
            required: FxHashSet::default(),
            temp_var_count: 0,
        };
        builtins::register(&mut program);
        program
    }

    /// A fresh temporary variable node. Temporary names start with `#`
    /// so they can never collide with source variables.
    pub fn new_temp_var(&mut self) -> Node {
        self.temp_var_count += 1;
        Node::var(format!("#temp_{}", self.temp_var_count))
    }

    /// The method table for `class`, created empty on first use.
    pub fn class_table(&mut self, class: &str) -> &mut MethodTable {
        self.classes.entry(class.to_string()).or_default()
    }

    /// Register an untyped definition into a class table (or the
    /// top-level table when `class` is `None`).
    ///
    /// Re-registering the same definition (a nested `def` visited once
    /// per enclosing specialization) keeps the existing entry, so the
    /// specializations cached on it survive. Only a genuinely different
    /// definition replaces the entry.
    pub fn define(&mut self, class: Option<&str>, def: Def) {
        let table = match class {
            Some(class) => self.class_table(class),
            None => &mut self.defs,
        };
        if let Some(existing) = table.get(&def.name) {
            let existing = existing.borrow();
            if existing.params == def.params && existing.body == def.body {
                return;
            }
        }
        table.insert(def.name.clone(), Rc::new(RefCell::new(def)));
    }
}

impl Default for Program {
    fn default() -> Self {
        Program::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garnet_ast::NodeKind;

    #[test]
    fn temp_vars_are_unique_and_unspellable() {
        let mut program = Program::new();
        let a = program.new_temp_var();
        let b = program.new_temp_var();
        match (&a.kind, &b.kind) {
            (NodeKind::Var(a), NodeKind::Var(b)) => {
                assert_ne!(a, b);
                assert!(a.starts_with('#'));
            }
            other => panic!("expected vars, got {other:?}"),
        }
    }

    #[test]
    fn builtins_are_seeded() {
        let program = Program::new();
        assert!(program.classes["Int"].contains_key("+"));
        assert!(program.defs.contains_key("putchar"));
    }
}
