//! Bridge errors - what native callers of the adapters see
//!
//! Two families: failures detected at this layer (conversion, construction
//! checks, protocol misuse), which carry a description, and `AlreadyRaised`,
//! which carries nothing because the peer's error indicator already holds the
//! diagnostic and must reach the boundary untouched.

use std::fmt;

use crate::runtime::ExceptionKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Element of a foreign iterable failed to convert (or a native element
    /// failed to convert outward)
    ElementConversion { index: usize },
    /// Argument marshaling for a foreign call failed
    ArgumentConversion { position: usize, arity: usize },
    /// Result of a foreign call failed to convert back
    ResultConversion,
    /// Native function received the wrong number of peer arguments
    ArgumentCount { function: String, expected: usize, got: usize },
    NotIterable { type_name: String },
    NotCallable { type_name: String },
    /// The peer protocol misbehaved independent of conversion
    Protocol { operation: &'static str, message: String },
    /// Peer error indicator is set; propagate unchanged
    AlreadyRaised,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ElementConversion { index } => {
                write!(f, "bad element in iterable (index {})", index)
            }
            Self::ArgumentConversion { position, arity } => {
                write!(f, "could not convert argument {} of {}", position, arity)
            }
            Self::ResultConversion => f.write_str("could not convert call result"),
            Self::ArgumentCount { function, expected, got } => {
                write!(f, "{}() takes {} arguments ({} given)", function, expected, got)
            }
            Self::NotIterable { type_name } => {
                write!(f, "expected an iterable, not {}", type_name)
            }
            Self::NotCallable { type_name } => {
                write!(f, "expected a callable object, not {}", type_name)
            }
            Self::Protocol { operation, message } => write!(f, "{}: {}", operation, message),
            Self::AlreadyRaised => f.write_str("error already raised in peer runtime"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeError {
    pub kind: ErrorKind,
    pub context: Option<String>,
}

pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, context: None }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn element_conversion(index: usize) -> Self {
        Self::new(ErrorKind::ElementConversion { index })
    }

    pub fn argument_conversion(position: usize, arity: usize) -> Self {
        Self::new(ErrorKind::ArgumentConversion { position, arity })
    }

    pub fn result_conversion() -> Self {
        Self::new(ErrorKind::ResultConversion)
    }

    pub fn argument_count(function: impl Into<String>, expected: usize, got: usize) -> Self {
        Self::new(ErrorKind::ArgumentCount {
            function: function.into(),
            expected,
            got,
        })
    }

    pub fn not_iterable(type_name: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotIterable { type_name: type_name.into() })
    }

    pub fn not_callable(type_name: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotCallable { type_name: type_name.into() })
    }

    pub fn protocol(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol {
            operation,
            message: message.into(),
        })
    }

    pub fn already_raised() -> Self {
        Self::new(ErrorKind::AlreadyRaised)
    }

    #[inline]
    pub fn is_already_raised(&self) -> bool {
        matches!(self.kind, ErrorKind::AlreadyRaised)
    }

    /// Whether this is one of the conversion failures
    pub fn is_conversion(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ElementConversion { .. } | ErrorKind::ArgumentConversion { .. } | ErrorKind::ResultConversion
        )
    }

    /// Peer exception this error is reflected as; `None` for `AlreadyRaised`
    pub fn exception_kind(&self) -> Option<ExceptionKind> {
        match self.kind {
            ErrorKind::ElementConversion { .. }
            | ErrorKind::ArgumentConversion { .. }
            | ErrorKind::ResultConversion
            | ErrorKind::ArgumentCount { .. }
            | ErrorKind::NotIterable { .. }
            | ErrorKind::NotCallable { .. } => Some(ExceptionKind::TypeError),
            ErrorKind::Protocol { .. } => Some(ExceptionKind::RuntimeError),
            ErrorKind::AlreadyRaised => None,
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} ({})", self.kind, context),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<ErrorKind> for BridgeError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests;
