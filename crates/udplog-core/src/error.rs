//! Error types for the log engine.

use thiserror::Error;

/// Errors that can occur in the log engine.
#[derive(Debug, Error)]
pub enum LogError {
    /// An I/O error occurred while persisting or sweeping log files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted log line or timestamp could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A queue or buffer was configured with an unusable capacity.
    #[error("invalid capacity for {what}: {value}")]
    InvalidCapacity {
        /// Which component was misconfigured.
        what: &'static str,
        /// The rejected value.
        value: usize,
    },
}

/// Result type alias for log operations.
pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = LogError::Parse("missing bracket".to_string());
        assert_eq!(err.to_string(), "parse error: missing bracket");

        let err = LogError::InvalidCapacity {
            what: "subscriber queue",
            value: 0,
        };
        assert_eq!(err.to_string(), "invalid capacity for subscriber queue: 0");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LogError>();
    }

    #[test]
    fn error_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: LogError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn error_serde_conversion() {
        let serde_err = serde_json::from_str::<i32>("nope").unwrap_err();
        let err = LogError::from(serde_err);
        assert!(matches!(err, LogError::Serialization(_)));
    }
}
