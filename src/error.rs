//! Error types for dump reading, selection and rendering

use thiserror::Error;

/// Errors raised while turning a classifier dump into a figure
#[derive(Debug, Error)]
pub enum VisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No representative interval found for attribute {attribute}")]
    NoRepresentativeInterval { attribute: usize },

    #[error("Render error: {0}")]
    Render(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VisError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Result type for tsvis operations
pub type Result<T> = std::result::Result<T, VisError>;
