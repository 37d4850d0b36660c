//! Error types for noema.
//!
//! All errors are strongly typed using thiserror. The taxonomy is strict:
//! unification failure and barrier timeouts are *data* (a false fuzzy value),
//! never errors. Configuration errors are raised once, while plans and rules
//! are being built, and abort the load phase. Type mismatches are recovered
//! at the action boundary and propagate everywhere else.

use thiserror::Error;

use crate::path::Path;

/// Errors raised while building plans, rules, and execution nodes.
///
/// These are fatal to the construction of the offending structure and are
/// never raised mid-execution.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unification target contains no variables")]
    NoVariables,

    #[error("variable '{variable}' is referenced more than once in a unification target")]
    DuplicateVariable {
        variable: Path,
    },

    #[error("rule '{rule}' is still a placeholder after resolution")]
    UnresolvedPlaceholder {
        rule: Path,
    },

    #[error("annotation '{kind}' is defined more than once")]
    DuplicateAnnotation {
        kind: &'static str,
    },

    #[error("annotations '{first}' and '{second}' cannot be combined")]
    ConflictingAnnotations {
        first: &'static str,
        second: &'static str,
    },

    #[error("literal functor cannot be empty")]
    EmptyFunctor,

    #[error("a plan requires a trigger")]
    MissingTrigger,

    #[error("fuzzy degree {value} is out of range [0.0, 1.0]")]
    DegreeOutOfRange {
        value: f64,
    },
}

/// Infrastructure errors raised while a reasoning cycle is running.
///
/// Plan outcomes are never represented here; a failed plan is a fuzzy
/// value, not an error.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("storage error: {message}")]
    Storage {
        message: String,
    },

    #[error("trigger queue full (capacity {capacity})")]
    QueueFull {
        capacity: usize,
    },

    #[error("channel disconnected: {context}")]
    Disconnected {
        context: &'static str,
    },

    #[error("no action registered under '{name}'")]
    UnknownAction {
        name: Path,
    },

    #[error("variable '{name}' is not part of the execution context")]
    MissingVariable {
        name: Path,
    },
}

/// Top-level error type for noema.
#[derive(Debug, Error)]
pub enum NoemaError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("internal error: {message}")]
    Internal {
        message: String,
    },
}

impl NoemaError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a type-mismatch error from two type names.
    #[must_use]
    pub const fn type_mismatch(expected: &'static str, actual: &'static str) -> Self {
        Self::TypeMismatch { expected, actual }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if this is a type-mismatch error.
    #[must_use]
    pub const fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }
}

/// Result type alias for noema operations.
pub type NoemaResult<T> = Result<T, NoemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_duplicate_variable() {
        let err = ConfigurationError::DuplicateVariable {
            variable: Path::from("X"),
        };
        let msg = format!("{err}");
        assert!(msg.contains('X'));
        assert!(msg.contains("more than once"));
    }

    #[test]
    fn test_configuration_error_degree() {
        let err = ConfigurationError::DegreeOutOfRange { value: 1.5 };
        let msg = format!("{err}");
        assert!(msg.contains("1.5"));
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn test_execution_error_queue_full() {
        let err = ExecutionError::QueueFull { capacity: 64 };
        let msg = format!("{err}");
        assert!(msg.contains("64"));
    }

    #[test]
    fn test_noema_error_from_configuration() {
        let err: NoemaError = ConfigurationError::NoVariables.into();
        assert!(err.is_configuration());
        assert!(!err.is_execution());
    }

    #[test]
    fn test_noema_error_type_mismatch() {
        let err = NoemaError::type_mismatch("number", "text");
        assert!(err.is_type_mismatch());
        let msg = format!("{err}");
        assert!(msg.contains("number"));
        assert!(msg.contains("text"));
    }

    #[test]
    fn test_noema_error_internal() {
        let err = NoemaError::internal("unexpected state");
        let msg = format!("{err}");
        assert!(msg.contains("unexpected state"));
    }
}
