//! Shared infrastructure for the Garnet compiler.
//!
//! Provides source locations and the diagnostic reporter used by both
//! the normalizer and the type/scope engine.

pub mod error;
pub mod span;

pub use error::{Diagnostic, TraceFrame};
pub use span::Location;
