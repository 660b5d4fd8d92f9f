//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use bytes::Bytes;
use std::io;
use thiserror::Error;

/// Portmux error type
#[derive(Error, Debug)]
pub enum MuxError {
    /// No pattern matched and no fallback handler is registered
    #[error("no matching handler for connection")]
    NotFound {
        /// Bytes consumed from the stream while matching
        consumed: Bytes,
    },

    /// The stream's read failed before a match could be determined
    #[error("read error while matching: {source}")]
    Read {
        /// Bytes consumed from the stream before the failure
        consumed: Bytes,
        /// The underlying read error
        source: io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid pattern registration
    #[error("Invalid pattern: {0}")]
    Pattern(String),
}

impl MuxError {
    /// Bytes consumed from the stream before a matching failure.
    ///
    /// Both matching failures (`NotFound`, `Read`) carry the exact byte
    /// sequence read while deciding, so callers can still log or replay
    /// it. Other error kinds consume nothing and return an empty slice.
    pub fn consumed(&self) -> &[u8] {
        match self {
            MuxError::NotFound { consumed } => consumed,
            MuxError::Read { consumed, .. } => consumed,
            _ => &[],
        }
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `MuxError`.
pub type Result<T> = std::result::Result<T, MuxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let mux_err: MuxError = io_err.into();

        match mux_err {
            MuxError::Io(_) => {}
            _ => panic!("Should convert to IO error"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = MuxError::Config("Invalid configuration".to_string());
        let err_str = format!("{}", err);
        assert!(err_str.contains("Invalid configuration"));
    }

    #[test]
    fn test_consumed_bytes() {
        let err = MuxError::NotFound {
            consumed: Bytes::from_static(b"QQQ"),
        };
        assert_eq!(err.consumed(), b"QQQ");

        let err = MuxError::Read {
            consumed: Bytes::from_static(b"GE"),
            source: io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
        };
        assert_eq!(err.consumed(), b"GE");

        let err = MuxError::Config("x".to_string());
        assert!(err.consumed().is_empty());
    }
}
