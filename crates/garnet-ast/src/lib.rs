//! The Garnet AST: a closed, tagged-variant node hierarchy plus the
//! concrete type domain (primitives, nominal class types, union types).
//!
//! The parser produces this tree, the normalizer rewrites it into a
//! smaller core vocabulary, and the type/scope engine fills in every
//! node's type slot.

pub mod node;
pub mod ty;

pub use node::{Call, Def, Node, NodeKind, Param, Primitive, When};
pub use ty::Type;
