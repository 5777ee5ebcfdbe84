//! Sockets, TLS and the session state machine.

mod client;
mod connector;
mod stream;

pub use client::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, SmtpConnection,
};
pub use connector::{Connector, RustlsConnector};
pub use stream::{AsyncIo, BoxedIo, SmtpStream};

use crate::types::{AuthMechanism, Extension};
use std::time::Duration;

/// What the server told us about itself.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// First word of the greeting, usually the server's hostname.
    pub hostname: String,
    /// Capabilities from the latest EHLO, in the order advertised.
    pub extensions: Vec<Extension>,
}

impl ServerInfo {
    /// True if the latest EHLO advertised `STARTTLS`.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.extensions.contains(&Extension::StartTls)
    }

    /// Mechanisms from the `AUTH` capability; empty if none was advertised.
    #[must_use]
    pub fn auth_mechanisms(&self) -> &[AuthMechanism] {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Deadlines applied to every socket operation of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP connect deadline.
    pub connect: Duration,
    /// TLS handshake deadline (implicit TLS and STARTTLS).
    pub handshake: Duration,
    /// Deadline for each individual read or write.
    pub io: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            handshake: Duration::from_secs(30),
            io: Duration::from_secs(60),
        }
    }
}

impl Timeouts {
    /// Uses the same deadline for every operation.
    #[must_use]
    pub const fn uniform(timeout: Duration) -> Self {
        Self {
            connect: timeout,
            handshake: timeout,
            io: timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_from_ehlo_lines() {
        let info = ServerInfo {
            hostname: "mx.example.com".into(),
            extensions: ["SIZE 1000", "STARTTLS", "AUTH PLAIN LOGIN"]
                .into_iter()
                .map(Extension::parse)
                .collect(),
        };
        assert!(info.supports_starttls());
        assert_eq!(
            info.auth_mechanisms(),
            &[AuthMechanism::Plain, AuthMechanism::Login]
        );
        assert!(ServerInfo::default().auth_mechanisms().is_empty());
        assert!(!ServerInfo::default().supports_starttls());
    }

    #[test]
    fn uniform_timeouts() {
        let t = Timeouts::uniform(Duration::from_secs(5));
        assert_eq!((t.connect, t.handshake, t.io), (Duration::from_secs(5), Duration::from_secs(5), Duration::from_secs(5)));
        assert_eq!(Timeouts::default().io, Duration::from_secs(60));
    }
}
