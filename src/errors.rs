//! Query error types
//!
//! Error codes:
//! - MEMQUERY_UNSUPPORTED_EXPRESSION
//! - MEMQUERY_MISSING_ARGUMENT
//! - MEMQUERY_EVALUATION_FAILED
//! - MEMQUERY_INVALID_OPERATION
//! - MEMQUERY_CONVERSION_FAILED
//! - MEMQUERY_IO_FAILED
//!
//! Nothing in the crate recovers from these locally. Every error reaches the
//! caller unchanged, including errors raised while serving an async entry point.

use thiserror::Error;

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while building, rewriting or evaluating a query
#[derive(Debug, Error)]
pub enum QueryError {
    /// The tree cannot be evaluated by the local engine
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// A required input was absent at construction time
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    /// The local engine failed while evaluating the tree
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// The operation is not valid for the evaluated sequence
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A value could not be converted to or from the requested type
    #[error("Conversion failed: {0}")]
    Conversion(#[from] serde_json::Error),

    /// A configured log sink could not be opened
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    /// Create an unsupported expression error
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedExpression(reason.into())
    }

    /// Create an evaluation error
    pub fn evaluation(reason: impl Into<String>) -> Self {
        Self::Evaluation(reason.into())
    }

    /// Create an invalid operation error
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation(reason.into())
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedExpression(_) => "MEMQUERY_UNSUPPORTED_EXPRESSION",
            Self::MissingArgument(_) => "MEMQUERY_MISSING_ARGUMENT",
            Self::Evaluation(_) => "MEMQUERY_EVALUATION_FAILED",
            Self::InvalidOperation(_) => "MEMQUERY_INVALID_OPERATION",
            Self::Conversion(_) => "MEMQUERY_CONVERSION_FAILED",
            Self::Io(_) => "MEMQUERY_IO_FAILED",
        }
    }

    /// Returns true if the tree was rejected as unsupported
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedExpression(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            QueryError::unsupported("x").code(),
            "MEMQUERY_UNSUPPORTED_EXPRESSION"
        );
        assert_eq!(
            QueryError::MissingArgument("source").code(),
            "MEMQUERY_MISSING_ARGUMENT"
        );
        assert_eq!(
            QueryError::evaluation("x").code(),
            "MEMQUERY_EVALUATION_FAILED"
        );
        assert_eq!(
            QueryError::invalid_operation("x").code(),
            "MEMQUERY_INVALID_OPERATION"
        );
    }

    #[test]
    fn test_conversion_from_serde() {
        let err: QueryError = serde_json::from_str::<u32>("\"nope\"").unwrap_err().into();
        assert_eq!(err.code(), "MEMQUERY_CONVERSION_FAILED");
        assert!(!err.is_unsupported());
    }

    #[test]
    fn test_error_display() {
        let err = QueryError::unsupported("raw command 'sp_Unknown' has no seeded result");
        let display = format!("{}", err);
        assert!(display.contains("Unsupported expression"));
        assert!(display.contains("sp_Unknown"));
        assert!(err.is_unsupported());
    }
}
