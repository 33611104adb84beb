//! AST nodes.
//!
//! Every node carries a general source location, an optional
//! name-specific location (calls and defs underline their name in
//! diagnostics), and a type slot the type/scope engine fills in. The
//! slot is never widened in place -- widening always stores a freshly
//! built union.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use garnet_common::Location;

use crate::ty::Type;

/// One AST node: a kind tag plus the cross-cutting slots shared by
/// every kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub location: Location,
    /// Where the node's name starts, when that is more precise than
    /// `location`. Diagnostics prefer this column for the underline.
    pub name_location: Option<Location>,
    /// Filled in by the type/scope engine.
    pub ty: Option<Type>,
}

/// The closed set of node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Ordered sequence; its type is the type of the last node. Empty
    /// sequences never survive normalization.
    Expressions(Vec<Node>),
    BoolLiteral(bool),
    IntLiteral(i64),
    FloatLiteral(f64),
    CharLiteral(char),
    StringLiteral(String),
    SymbolLiteral(String),
    /// Literal and interpolated pieces in source order.
    StringInterpolation(Vec<Node>),
    RangeLiteral {
        from: Box<Node>,
        to: Box<Node>,
        exclusive: bool,
    },
    RegexpLiteral(String),
    Var(String),
    InstanceVar(String),
    /// Qualified constant reference; `global` anchors lookup at the
    /// program root.
    Ident { names: Vec<String>, global: bool },
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    Call(Call),
    Def(Def),
    ClassDef {
        name: String,
        body: Option<Box<Node>>,
    },
    ModuleDef {
        name: String,
        body: Option<Box<Node>>,
    },
    If {
        cond: Box<Node>,
        then: Option<Box<Node>>,
        els: Option<Box<Node>>,
    },
    Unless {
        cond: Box<Node>,
        then: Option<Box<Node>>,
        els: Option<Box<Node>>,
    },
    While {
        cond: Box<Node>,
        body: Option<Box<Node>>,
    },
    Case {
        cond: Box<Node>,
        whens: Vec<When>,
        els: Option<Box<Node>>,
    },
    /// Short-circuit conjunction; desugared to `If` by the normalizer.
    And {
        left: Box<Node>,
        right: Box<Node>,
    },
    /// Short-circuit disjunction; desugared to `If` by the normalizer.
    Or {
        left: Box<Node>,
        right: Box<Node>,
    },
    /// Non-short-circuit disjunction produced by `case` desugaring.
    SimpleOr {
        left: Box<Node>,
        right: Box<Node>,
    },
    IsA {
        obj: Box<Node>,
        type_name: String,
    },
    Return(Vec<Node>),
    Break(Vec<Node>),
    Next(Vec<Node>),
    Yield(Vec<Node>),
    /// A block attached to a call.
    Block {
        params: Vec<String>,
        body: Option<Box<Node>>,
    },
    Require { path: String },
    /// Compiler-provided method body, typed by rule during
    /// specialization rather than by traversal.
    Primitive(Primitive),
}

/// How a builtin method body types itself during specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Binary operator whose result has the receiver's type.
    BinaryOp,
    /// Comparison: always `Bool`.
    Compare,
    /// Case-equality (`===`): always `Bool`.
    CaseEqual,
    /// Constructor: the owner class itself.
    Allocate,
    /// Conversion to `String`.
    ToString,
    /// `putchar`: always `Char`.
    PutChar,
}

/// One `when` clause of a `case` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct When {
    pub conds: Vec<Node>,
    pub body: Option<Node>,
}

/// A method call. After inference, `target_defs` holds the resolved
/// specializations: exactly one for a non-union receiver, one per
/// member for a union receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub obj: Option<Box<Node>>,
    pub name: String,
    pub args: Vec<Node>,
    pub block: Option<Box<Node>>,
    pub has_parens: bool,
    pub target_defs: Vec<Rc<Def>>,
}

impl Call {
    /// The resolved specialization for a single-dispatch call.
    pub fn target_def(&self) -> Option<&Rc<Def>> {
        self.target_defs.first()
    }
}

/// A method parameter. `default` only survives until the normalizer
/// expands defaulted defs; `ty` is set on specialized instances.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Box<Node>>,
    pub ty: Option<Type>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            default: None,
            ty: None,
        }
    }

    pub fn with_default(name: impl Into<String>, default: Node) -> Self {
        Param {
            name: name.into(),
            default: Some(Box::new(default)),
            ty: None,
        }
    }
}

/// A method definition.
///
/// An untyped `Def` registered in a method table owns the
/// monomorphization cache: one fully-typed instance per distinct
/// argument-type tuple, shared via `Rc` so cache hits are observable by
/// pointer identity. Instances themselves carry an empty cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Def {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Option<Box<Node>>,
    /// Receiver type a specialization was built for.
    pub owner: Option<Type>,
    pub instances: FxHashMap<Vec<Type>, Rc<Def>>,
}

impl Def {
    pub fn new(name: impl Into<String>, params: Vec<Param>, body: Option<Node>) -> Self {
        Def {
            name: name.into(),
            params,
            body: body.map(Box::new),
            owner: None,
            instances: FxHashMap::default(),
        }
    }

    pub fn has_default_params(&self) -> bool {
        self.params.iter().any(|p| p.default.is_some())
    }

    /// Derive a fresh specialization template: a deep copy of the
    /// signature and body with no owner and an empty instance cache.
    /// Nothing mutable is shared with `self`.
    pub fn instantiate(&self) -> Def {
        Def {
            name: self.name.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            owner: None,
            instances: FxHashMap::default(),
        }
    }

    pub fn add_instance(&mut self, arg_types: Vec<Type>, instance: Rc<Def>) {
        self.instances.insert(arg_types, instance);
    }

    pub fn lookup_instance(&self, arg_types: &[Type]) -> Option<Rc<Def>> {
        self.instances.get(arg_types).cloned()
    }

    /// The type of the specialized body; `Nil` for an empty body.
    pub fn body_type(&self) -> Type {
        match &self.body {
            Some(body) => body.ty_or_nil(),
            None => Type::Nil,
        }
    }
}

impl Node {
    pub fn new(kind: NodeKind) -> Node {
        Node {
            kind,
            location: Location::default(),
            name_location: None,
            ty: None,
        }
    }

    /// Stamp the node with its source location.
    pub fn at(mut self, location: Location) -> Node {
        self.location = location;
        self
    }

    /// Stamp the node with the location its name starts at.
    pub fn at_name(mut self, location: Location) -> Node {
        self.name_location = Some(location);
        self
    }

    /// The inferred type, with `Nil` standing in for nodes inference
    /// leaves untyped (definitions, class bodies).
    pub fn ty_or_nil(&self) -> Type {
        self.ty.clone().unwrap_or(Type::Nil)
    }

    // ── Constructors for commonly built kinds ─────────────────────────

    pub fn expressions(nodes: Vec<Node>) -> Node {
        Node::new(NodeKind::Expressions(nodes))
    }

    pub fn bool_lit(value: bool) -> Node {
        Node::new(NodeKind::BoolLiteral(value))
    }

    pub fn int(value: i64) -> Node {
        Node::new(NodeKind::IntLiteral(value))
    }

    pub fn float(value: f64) -> Node {
        Node::new(NodeKind::FloatLiteral(value))
    }

    pub fn char_lit(value: char) -> Node {
        Node::new(NodeKind::CharLiteral(value))
    }

    pub fn string(value: impl Into<String>) -> Node {
        Node::new(NodeKind::StringLiteral(value.into()))
    }

    pub fn symbol(value: impl Into<String>) -> Node {
        Node::new(NodeKind::SymbolLiteral(value.into()))
    }

    pub fn var(name: impl Into<String>) -> Node {
        Node::new(NodeKind::Var(name.into()))
    }

    pub fn instance_var(name: impl Into<String>) -> Node {
        Node::new(NodeKind::InstanceVar(name.into()))
    }

    pub fn ident(names: Vec<String>, global: bool) -> Node {
        Node::new(NodeKind::Ident { names, global })
    }

    /// A single-segment global constant reference.
    pub fn const_ref(name: impl Into<String>) -> Node {
        Node::ident(vec![name.into()], true)
    }

    pub fn assign(target: Node, value: Node) -> Node {
        Node::new(NodeKind::Assign {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn call(obj: Option<Node>, name: impl Into<String>, args: Vec<Node>) -> Node {
        Node::new(NodeKind::Call(Call {
            obj: obj.map(Box::new),
            name: name.into(),
            args,
            block: None,
            has_parens: false,
            target_defs: Vec::new(),
        }))
    }

    /// Mark a call as written with parentheses. No-op for other kinds.
    pub fn with_parens(mut self) -> Node {
        if let NodeKind::Call(call) = &mut self.kind {
            call.has_parens = true;
        }
        self
    }

    pub fn if_expr(cond: Node, then: Option<Node>, els: Option<Node>) -> Node {
        Node::new(NodeKind::If {
            cond: Box::new(cond),
            then: then.map(Box::new),
            els: els.map(Box::new),
        })
    }

    pub fn def(def: Def) -> Node {
        Node::new(NodeKind::Def(def))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instantiate_shares_nothing_mutable() {
        let mut untyped = Def::new("foo", vec![Param::new("x")], Some(Node::var("x")));
        untyped.owner = Some(Type::Int);
        untyped.add_instance(vec![Type::Int], Rc::new(untyped.instantiate()));

        let instance = untyped.instantiate();
        assert!(instance.instances.is_empty());
        assert!(instance.owner.is_none());
        assert_eq!(instance.params, untyped.params);
    }

    #[test]
    fn instance_cache_keyed_by_argument_types() {
        let mut def = Def::new("foo", vec![Param::new("x")], Some(Node::var("x")));
        let int_instance = Rc::new(def.instantiate());
        def.add_instance(vec![Type::Int], Rc::clone(&int_instance));

        let hit = def.lookup_instance(&[Type::Int]).unwrap();
        assert!(Rc::ptr_eq(&hit, &int_instance));
        assert!(def.lookup_instance(&[Type::Float]).is_none());
    }

    #[test]
    fn body_type_defaults_to_nil() {
        let def = Def::new("foo", vec![], None);
        assert_eq!(def.body_type(), Type::Nil);
    }
}
