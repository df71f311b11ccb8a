//! Crate-level error type
//!
//! Protocol faults inside an event are never errors here; they end up in the
//! event's error mask. This type covers the seams around the decoder: config
//! files, dump files, worker tasks.

use thiserror::Error;

use crate::config::ConfigError;
use crate::recorder::FileFormatError;

/// Errors raised outside of event decoding
#[derive(Error, Debug)]
pub enum UnpackError {
    /// Configuration file could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dump file is malformed
    #[error("Dump file error: {0}")]
    Format(#[from] FileFormatError),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Decode worker panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// Invalid command line or option value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl UnpackError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type alias using UnpackError
pub type UnpackResult<T> = Result<T, UnpackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_error() {
        let err = UnpackError::invalid_argument("workers must be at least 1");
        assert!(err.to_string().contains("Invalid argument"));
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: UnpackError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_format_error_from() {
        let err: UnpackError = FileFormatError::IncompleteFile.into();
        assert!(err.to_string().contains("Dump file error"));
    }

    #[test]
    fn test_other_error() {
        let err = UnpackError::other("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
    }
}
