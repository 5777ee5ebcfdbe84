//! One-shot submission sessions.
//!
//! [`send_mail`] drives a complete connect → EHLO → (STARTTLS) → AUTH →
//! MAIL → RCPT → DATA → QUIT cycle for a single recipient. Connections are
//! never reused.

use crate::connection::{Client, Connected, Connector, SmtpStream, Timeouts};
use crate::error::Result;
use crate::types::Address;
use tracing::Instrument;

/// Transport variant of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Plaintext connect, then `STARTTLS` (explicit TLS).
    StartTls,
    /// TLS from the first byte (implicit TLS).
    Implicit,
}

impl Security {
    /// Picks the variant from a port and an optional encryption setting.
    ///
    /// `ssl` or port 465 selects implicit TLS; everything else, including
    /// port 587 with `tls`, uses STARTTLS.
    #[must_use]
    pub fn select(port: u16, encryption: Option<&str>) -> Self {
        let ssl = encryption.is_some_and(|e| e.eq_ignore_ascii_case("ssl"));
        if ssl || port == 465 {
            Self::Implicit
        } else {
            Self::StartTls
        }
    }

    /// Human-readable name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartTls => "starttls",
            Self::Implicit => "implicit-tls",
        }
    }
}

/// Username and secret for `AUTH LOGIN`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password or app secret.
    pub secret: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server hostname (also used for TLS server name verification).
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Transport variant.
    pub security: Security,
    /// Credentials; `None` skips authentication.
    pub credentials: Option<Credentials>,
    /// Name announced in EHLO.
    pub client_hostname: String,
    /// Socket deadlines.
    pub timeouts: Timeouts,
}

impl SessionConfig {
    /// Creates a configuration with STARTTLS on port 587 and default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            security: Security::StartTls,
            credentials: None,
            client_hostname: "localhost".to_string(),
            timeouts: Timeouts::default(),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the transport variant.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the EHLO hostname.
    #[must_use]
    pub fn client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }

    /// Sets the socket deadlines.
    #[must_use]
    pub const fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// Envelope sender and the single recipient of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `MAIL FROM` address.
    pub from: Address,
    /// `RCPT TO` address.
    pub to: Address,
}

/// Submits one message to one recipient over a fresh connection.
///
/// On failure the connection is dropped immediately without `QUIT`. After a
/// successful DATA phase the `QUIT` reply is not checked.
///
/// # Errors
///
/// Returns the first connection, TLS, protocol, authentication or timeout
/// error encountered.
pub async fn send_mail<C: Connector + ?Sized>(
    connector: &C,
    config: &SessionConfig,
    envelope: &Envelope,
    message: &[u8],
) -> Result<()> {
    let span = tracing::debug_span!(
        "smtp_session",
        host = %config.host,
        port = config.port,
        security = config.security.as_str(),
        to = %envelope.to,
    );
    run(connector, config, envelope, message)
        .instrument(span)
        .await
}

async fn run<C: Connector + ?Sized>(
    connector: &C,
    config: &SessionConfig,
    envelope: &Envelope,
    message: &[u8],
) -> Result<()> {
    let client = open(connector, config).await?;

    let client = match &config.credentials {
        Some(creds) => {
            client
                .auth_login(&creds.username, &creds.secret)
                .await?
                .mail_from(envelope.from.clone())
                .await?
        }
        None => client.mail_from(envelope.from.clone()).await?,
    };

    let client = client
        .rcpt_to(envelope.to.clone())
        .await?
        .data()
        .await?
        .send_message(message)
        .await?;

    if let Err(e) = client.quit().await {
        tracing::debug!(error = %e, "QUIT failed after delivery, ignoring");
    }

    Ok(())
}

/// Connects, reads the greeting and completes EHLO (and STARTTLS).
async fn open<C: Connector + ?Sized>(
    connector: &C,
    config: &SessionConfig,
) -> Result<Client<Connected>> {
    let timeouts = config.timeouts;
    let io = connector.connect(&config.host, config.port, &timeouts).await?;

    match config.security {
        Security::StartTls => {
            let stream = SmtpStream::new(io, false, timeouts);
            Client::from_stream(stream)
                .await?
                .ehlo(&config.client_hostname)
                .await?
                .starttls(connector, &config.host, &config.client_hostname)
                .await
        }
        Security::Implicit => {
            let io = connector.upgrade(io, &config.host, &timeouts).await?;
            let stream = SmtpStream::new(io, true, timeouts);
            Client::from_stream(stream)
                .await?
                .ehlo(&config.client_hostname)
                .await
        }
    }
}
