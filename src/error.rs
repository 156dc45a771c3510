//! Error types for record mapping.
//!
//! Missing data is never an error here: lookups that find nothing are
//! skipped by the mapper. What remains are configuration defects:
//!
//! - [`ExpressionError`] - a condition that cannot be parsed or evaluated
//! - [`MapError`] - everything the mapper can surface to its caller

use thiserror::Error;

/// Errors raised while parsing or evaluating a condition expression.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    /// The expression text could not be parsed.
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    /// The expression refers to a name that is not in scope.
    #[error("Variable \"{0}\" is not valid")]
    UnknownVariable(String),

    /// An operator was applied to operands it cannot handle.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The pattern given to `matches` is not a valid regular expression.
    #[error("Invalid regular expression \"{pattern}\": {message}")]
    InvalidRegex { pattern: String, message: String },
}

impl ExpressionError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        ExpressionError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ExpressionError::InvalidOperation(message.into())
    }
}

/// Errors surfaced by the mapper.
#[derive(Debug, Error)]
pub enum MapError {
    /// A condition in an array path failed.
    #[error("Condition \"{condition}\" failed: {source}")]
    Expression {
        condition: String,
        #[source]
        source: ExpressionError,
    },

    /// An array path separator is not a single ASCII character.
    #[error("Invalid array path separator \"{0}\": expected a single ASCII character")]
    InvalidSeparator(String),

    /// An array path could not be split into segments.
    #[error("Invalid array path \"{path}\": {message}")]
    InvalidPath { path: String, message: String },

    /// Failed to read or write data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV output error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, MapError>;
