//! Error types for normalization and inference.
//!
//! Two kinds only, both fatal to the compilation run: a
//! `NormalizeError` (require failures and their relatives) and an
//! `InferError` (name resolution and arity failures). An `InferError`
//! captures the scope back-trace at the point of failure and renders
//! through the shared diagnostic reporter.

use std::fmt;

use garnet_common::{Diagnostic, Location, TraceFrame};

/// Why normalization failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeErrorKind {
    /// The require loader could not produce an AST for `path`.
    RequireFailed { path: String, reason: String },
    /// A mandatory sub-expression normalized away to nothing (for
    /// example a condition that was a lone, already-loaded `require`).
    VanishedExpression,
}

impl fmt::Display for NormalizeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeErrorKind::RequireFailed { path, reason } => {
                write!(f, "can't require '{}': {}", path, reason)
            }
            NormalizeErrorKind::VanishedExpression => {
                write!(f, "expression normalized away where a value is required")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeError {
    pub kind: NormalizeErrorKind,
    pub location: Option<Location>,
}

impl NormalizeError {
    pub fn new(kind: NormalizeErrorKind, location: Option<Location>) -> Self {
        NormalizeError { kind, location }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::new(self.kind.to_string());
        match self.location {
            Some(location) => diag.at(location),
            None => diag,
        }
    }

    pub fn render(&self, source: &str) -> String {
        self.to_diagnostic().render(Some(source))
    }
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for NormalizeError {}

/// Why inference failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferErrorKind {
    /// No method of this name in the receiver's method table.
    UndefinedMethod {
        name: String,
        receiver: Option<String>,
    },
    /// A bare name that is neither a bound variable nor a top-level
    /// method.
    UndefinedLocalVariableOrMethod { name: String },
    /// Argument count differs from the definition's parameter count.
    WrongNumberOfArguments {
        name: String,
        found: usize,
        expected: usize,
    },
    /// A constant reference that names neither a constant nor a class.
    UninitializedConstant { name: String },
}

impl fmt::Display for InferErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferErrorKind::UndefinedMethod {
                name,
                receiver: Some(receiver),
            } => write!(f, "undefined method '{}' for {}", name, receiver),
            InferErrorKind::UndefinedMethod { name, receiver: None } => {
                write!(f, "undefined method '{}'", name)
            }
            InferErrorKind::UndefinedLocalVariableOrMethod { name } => {
                write!(f, "undefined local variable or method '{}'", name)
            }
            InferErrorKind::WrongNumberOfArguments {
                name,
                found,
                expected,
            } => write!(
                f,
                "wrong number of arguments for '{}' ({} for {})",
                name, found, expected
            ),
            InferErrorKind::UninitializedConstant { name } => {
                write!(f, "uninitialized constant {}", name)
            }
        }
    }
}

/// A fatal inference error with everything the reporter needs: the
/// offending node's locations, the underline span, the method being
/// specialized when the error fired, and the scope back-trace
/// (innermost frame first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferError {
    pub kind: InferErrorKind,
    pub location: Location,
    pub name_location: Option<Location>,
    pub underline_length: usize,
    pub context: Option<String>,
    pub frames: Vec<TraceFrame>,
}

impl InferError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut message = self.kind.to_string();
        if let Some(context) = &self.context {
            message.push_str(&format!(" in '{}'", context));
        }
        let mut diag = Diagnostic::new(message)
            .at(self.location)
            .with_underline(self.underline_length)
            .with_frames(self.frames.clone());
        if let Some(name_location) = self.name_location {
            diag = diag.at_name(name_location);
        }
        diag
    }

    pub fn render(&self, source: &str) -> String {
        self.to_diagnostic().render(Some(source))
    }
}

impl fmt::Display for InferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(context) = &self.context {
            write!(f, " in '{}'", context)?;
        }
        Ok(())
    }
}

impl std::error::Error for InferError {}

/// Either failure mode of the front half of the compiler.
#[derive(Debug, Clone, PartialEq)]
pub enum SemaError {
    Normalize(NormalizeError),
    Infer(InferError),
}

impl SemaError {
    pub fn render(&self, source: &str) -> String {
        match self {
            SemaError::Normalize(e) => e.render(source),
            SemaError::Infer(e) => e.render(source),
        }
    }
}

impl fmt::Display for SemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemaError::Normalize(e) => write!(f, "{}", e),
            SemaError::Infer(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SemaError {}

impl From<NormalizeError> for SemaError {
    fn from(e: NormalizeError) -> Self {
        SemaError::Normalize(e)
    }
}

impl From<InferError> for SemaError {
    fn from(e: InferError) -> Self {
        SemaError::Infer(e)
    }
}
