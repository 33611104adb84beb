//! Source locations for diagnostics.
//!
//! The parser stamps every AST node with a `Location`. Nodes that name
//! something (calls, defs) additionally carry a name-specific location,
//! so diagnostics can underline the name rather than the whole
//! expression.

use std::fmt;

use serde::Serialize;

/// A 1-based line/column position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Location { line, column }
    }
}

impl Default for Location {
    fn default() -> Self {
        Location { line: 1, column: 1 }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}
