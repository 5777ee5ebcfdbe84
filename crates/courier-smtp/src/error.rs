//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Could not establish the TCP connection or TLS session.
    #[error("Connection to {target} failed: {reason}")]
    Connection {
        /// Server address (`host:port`, or just the host for a handshake).
        target: String,
        /// Underlying failure.
        reason: String,
    },

    /// A socket operation did not complete before its deadline.
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        /// Operation that stalled (e.g. "connect", "read").
        operation: &'static str,
        /// Deadline that elapsed.
        after: Duration,
    },

    /// Server closed the connection in the middle of a reply.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// Server reply code did not match what the current state expects.
    #[error("{command} expected {}, got {actual}: {message}", format_codes(.expected))]
    UnexpectedReply {
        /// Command that produced the reply (`<greeting>` for the banner).
        command: String,
        /// Acceptable reply codes.
        expected: Vec<u16>,
        /// Reply code received.
        actual: u16,
        /// Reply text from server.
        message: String,
    },

    /// EHLO response did not advertise STARTTLS.
    #[error("Server does not advertise STARTTLS")]
    StartTlsUnavailable,

    /// AUTH LOGIN exchange was rejected.
    #[error("Authentication failed ({code}): {message}")]
    Auth {
        /// Reply code (e.g., 535).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (malformed reply, unexpected stream state).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Coarse failure category, used by callers that decide on a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket connect or TLS handshake failure.
    Connection,
    /// Reply code mismatch or malformed reply.
    Protocol,
    /// Credentials rejected.
    Auth,
    /// Deadline elapsed.
    Timeout,
}

impl Error {
    /// Creates an unexpected-reply error.
    #[must_use]
    pub fn unexpected(
        command: impl Into<String>,
        expected: &[u16],
        actual: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::UnexpectedReply {
            command: command.into(),
            expected: expected.to_vec(),
            actual,
            message: message.into(),
        }
    }

    /// Returns the failure category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Tls(_) | Self::Connection { .. } | Self::ConnectionClosed => {
                ErrorKind::Connection
            }
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::UnexpectedReply { .. }
            | Self::StartTlsUnavailable
            | Self::Protocol(_)
            | Self::InvalidAddress(_) => ErrorKind::Protocol,
        }
    }

    /// Returns the server reply code carried by this error, if any.
    #[must_use]
    pub const fn reply_code(&self) -> Option<u16> {
        match self {
            Self::UnexpectedReply { actual, .. } => Some(*actual),
            Self::Auth { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn format_codes(codes: &[u16]) -> String {
    codes
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_reply_names_command_and_codes() {
        let err = Error::unexpected("RCPT TO", &[250, 251], 550, "No such user");
        assert_eq!(
            err.to_string(),
            "RCPT TO expected 250/251, got 550: No such user"
        );
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.reply_code(), Some(550));
    }

    #[test]
    fn kinds() {
        assert_eq!(Error::ConnectionClosed.kind(), ErrorKind::Connection);
        assert_eq!(Error::StartTlsUnavailable.kind(), ErrorKind::Protocol);
        assert_eq!(
            Error::Auth {
                code: 535,
                message: String::new()
            }
            .kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            Error::Timeout {
                operation: "read",
                after: Duration::from_secs(5)
            }
            .kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn timeout_display() {
        let err = Error::Timeout {
            operation: "connect",
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "connect timed out after 30s");
    }
}
