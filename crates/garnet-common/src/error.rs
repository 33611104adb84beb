//! The diagnostic reporter.
//!
//! A `Diagnostic` is a fatal compile error rendered with full source
//! context: the message, the offending source line with a caret/tilde
//! underline, the scope back-trace captured at the point of failure,
//! and optionally a chained inner cause. Errors are never recovered
//! from -- one diagnostic terminates the compilation run.
//!
//! ```text
//! Error: undefined method 'bar' in 'foo'
//!
//!   bar(1)
//!   ^~~
//!
//! in line 2: 'foo'
//! in line 5
//! ```

use std::fmt;

use serde::Serialize;

use crate::span::Location;

/// One entry of the scope back-trace: the line the scope was entered
/// from and, when the scope belongs to a method specialization, that
/// method's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceFrame {
    pub line: u32,
    pub context: Option<String>,
}

impl TraceFrame {
    pub fn new(line: u32, context: Option<String>) -> Self {
        TraceFrame { line, context }
    }
}

/// A renderable compile error.
///
/// The underline starts at the name-specific column when one is known
/// and at the node's general column otherwise, and spans
/// `underline_length` characters (`^` followed by `~`s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub location: Option<Location>,
    pub name_location: Option<Location>,
    pub underline_length: usize,
    pub frames: Vec<TraceFrame>,
    pub inner: Option<Box<Diagnostic>>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            location: None,
            name_location: None,
            underline_length: 1,
            frames: Vec::new(),
            inner: None,
        }
    }

    /// Attach the node's general location.
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Attach the more precise column where the offending name starts.
    pub fn at_name(mut self, location: Location) -> Self {
        self.name_location = Some(location);
        self
    }

    /// Set the length of the caret/tilde underline.
    pub fn with_underline(mut self, length: usize) -> Self {
        self.underline_length = length;
        self
    }

    /// Attach the scope back-trace, innermost frame first.
    pub fn with_frames(mut self, frames: Vec<TraceFrame>) -> Self {
        self.frames = frames;
        self
    }

    /// Chain a root cause; it is rendered after this diagnostic.
    pub fn with_inner(mut self, inner: Diagnostic) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Render the full report. Source excerpts are only produced when
    /// the original source text is supplied.
    pub fn render(&self, source: Option<&str>) -> String {
        let mut out = String::from("Error: ");
        self.append_to(&mut out, source);
        out.trim_end().to_string()
    }

    fn append_to(&self, out: &mut String, source: Option<&str>) {
        out.push_str(&self.message);
        if let (Some(location), Some(source)) = (self.location, source) {
            if let Some(line_text) = source.lines().nth(location.line as usize - 1) {
                out.push_str("\n\n");
                out.push_str(line_text);
                out.push('\n');
                let column = self.name_location.unwrap_or(location).column;
                for _ in 1..column {
                    out.push(' ');
                }
                out.push('^');
                for _ in 1..self.underline_length.max(1) {
                    out.push('~');
                }
                out.push('\n');
            }
        }
        if !self.frames.is_empty() {
            out.push('\n');
            for frame in &self.frames {
                out.push_str("in line ");
                out.push_str(&frame.line.to_string());
                if let Some(context) = &frame.context {
                    out.push_str(": '");
                    out.push_str(context);
                    out.push('\'');
                }
                out.push('\n');
            }
        }
        if let Some(inner) = &self.inner {
            out.push('\n');
            inner.append_to(out, source);
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}

impl std::error::Error for Diagnostic {}
