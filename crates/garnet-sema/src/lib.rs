//! Semantic analysis: the front half of the compiler after parsing.
//!
//! Two passes over the AST. The [`normalize`] pass rewrites syntactic
//! sugar (`&&`, `||`, `unless`, `case`, default arguments, string
//! interpolation, range and regex literals, `require`) into a small
//! core vocabulary. The [`infer`] pass then types the normalized tree:
//! types flow bottom-up, control-flow joins widen to canonical unions,
//! and method calls drive memoized specialization, one typed clone per
//! distinct argument-type tuple.
//!
//! [`check`] runs both in order against a [`Program`] context.

pub mod builtins;
pub mod error;
pub mod infer;
pub mod normalize;
pub mod program;

pub use error::{InferError, InferErrorKind, NormalizeError, NormalizeErrorKind, SemaError};
pub use infer::infer;
pub use normalize::{NoRequires, Normalizer, RequireLoader};
pub use program::{MethodTable, Program};

use garnet_ast::Node;

/// Normalize and infer a tree in one step. Returns the normalized,
/// fully typed tree, or `None` when the whole tree normalized away.
pub fn check(
    program: &mut Program,
    node: Node,
    loader: &mut dyn RequireLoader,
) -> Result<Option<Node>, SemaError> {
    let normalized = Normalizer::new(program, loader).normalize(node)?;
    match normalized {
        Some(mut node) => {
            infer::infer(program, &mut node)?;
            Ok(Some(node))
        }
        None => Ok(None),
    }
}
