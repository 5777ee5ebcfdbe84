//! Commands sent by the client.

use crate::types::{Address, AuthMechanism};

/// One client command line.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// `EHLO <hostname>`.
    Ehlo {
        /// Name the client announces.
        hostname: String,
    },
    /// `STARTTLS`.
    StartTls,
    /// `AUTH <mechanism>`.
    Auth {
        /// SASL mechanism.
        mechanism: AuthMechanism,
    },
    /// A base64 line answering a `334` challenge.
    AuthResponse {
        /// Already encoded payload.
        encoded: String,
    },
    /// `MAIL FROM:<address>`.
    MailFrom {
        /// Envelope sender.
        from: Address,
    },
    /// `RCPT TO:<address>`.
    RcptTo {
        /// Envelope recipient.
        to: Address,
    },
    /// `DATA`.
    Data,
    /// `QUIT`.
    Quit,
}

impl Command {
    /// Wire form, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let line = match self {
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_owned(),
            Self::Auth { mechanism } => format!("AUTH {}", mechanism.as_str()),
            Self::AuthResponse { encoded } => encoded.clone(),
            Self::MailFrom { from } => format!("MAIL FROM:<{from}>"),
            Self::RcptTo { to } => format!("RCPT TO:<{to}>"),
            Self::Data => "DATA".to_owned(),
            Self::Quit => "QUIT".to_owned(),
        };
        let mut bytes = line.into_bytes();
        bytes.extend_from_slice(b"\r\n");
        bytes
    }

    /// Label for logs and errors. Never includes credentials.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } => "AUTH LOGIN",
            Self::AuthResponse { .. } => "AUTH response",
            Self::MailFrom { .. } => "MAIL FROM",
            Self::RcptTo { .. } => "RCPT TO",
            Self::Data => "DATA",
            Self::Quit => "QUIT",
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthResponse { .. } => f.write_str("AuthResponse(<redacted>)"),
            other => f.write_str(other.name()),
        }
    }
}
