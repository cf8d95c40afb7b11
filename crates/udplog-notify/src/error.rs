//! Error types for the udplog-notify crate.

use thiserror::Error;

/// Errors that can occur while forwarding entries.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A required credential is not configured.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// Building the client or sending a request failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for notifier operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
