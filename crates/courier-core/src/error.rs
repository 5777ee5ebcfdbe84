//! Error types for the core library.

use courier_smtp::ErrorKind;
use thiserror::Error;

/// Errors that can occur while resolving configuration or delivering mail.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings could not be loaded or are invalid, or a provider credential
    /// is missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Socket connect or TLS handshake failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server answered with an unexpected reply.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// `AUTH LOGIN` was rejected.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A socket deadline expired.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The fallback HTTP provider did not report success.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The message cannot be sent as given.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<courier_smtp::Error> for Error {
    fn from(err: courier_smtp::Error) -> Self {
        let text = err.to_string();
        match err.kind() {
            ErrorKind::Connection => Self::Connection(text),
            ErrorKind::Protocol => Self::Protocol(text),
            ErrorKind::Auth => Self::Auth(text),
            ErrorKind::Timeout => Self::Timeout(text),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn smtp_errors_keep_their_kind() {
        let err: Error = courier_smtp::Error::Auth {
            code: 535,
            message: "bad credentials".into(),
        }
        .into();
        assert!(matches!(err, Error::Auth(ref m) if m.contains("535")));

        let err: Error = courier_smtp::Error::Timeout {
            operation: "read",
            after: Duration::from_secs(60),
        }
        .into();
        assert!(matches!(err, Error::Timeout(_)));

        let err: Error = courier_smtp::Error::StartTlsUnavailable.into();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
