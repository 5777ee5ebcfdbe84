//! Direct SMTP path.

use std::sync::Arc;

use async_trait::async_trait;
use courier_smtp::{
    Address, Connector, Credentials, Envelope, HtmlMessage, RustlsConnector, SessionConfig,
    Timeouts, send_mail,
};

use crate::Result;
use crate::config::TransportConfig;
use crate::service::OutboundMessage;
use url::{Host, Url};

/// Delivers a message to a single recipient over SMTP.
#[async_trait]
pub trait DirectTransport: Send + Sync {
    /// Runs one complete session for `recipient`.
    ///
    /// # Errors
    ///
    /// Returns a connection, protocol, authentication or timeout error.
    async fn send(
        &self,
        config: &TransportConfig,
        message: &OutboundMessage,
        recipient: &Address,
    ) -> Result<()>;
}

#[async_trait]
impl<T: DirectTransport + ?Sized> DirectTransport for Arc<T> {
    async fn send(
        &self,
        config: &TransportConfig,
        message: &OutboundMessage,
        recipient: &Address,
    ) -> Result<()> {
        (**self).send(config, message, recipient).await
    }
}

/// [`DirectTransport`] over [`courier_smtp::send_mail`].
#[derive(Debug, Clone)]
pub struct SmtpTransport<C> {
    connector: C,
    timeouts: Timeouts,
    client_hostname: Option<String>,
}

impl SmtpTransport<RustlsConnector> {
    /// Creates a transport over TCP and rustls with the webpki roots.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS configuration cannot be built.
    pub fn rustls() -> Result<Self> {
        Ok(Self::new(RustlsConnector::new()?))
    }
}

impl<C: Connector> SmtpTransport<C> {
    /// Creates a transport with default timeouts.
    ///
    /// The EHLO hostname is taken from the public base URL unless set.
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            timeouts: Timeouts::default(),
            client_hostname: None,
        }
    }

    /// Sets the socket deadlines.
    #[must_use]
    pub const fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets the EHLO hostname.
    #[must_use]
    pub fn client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = Some(hostname.into());
        self
    }

    fn session_config(&self, config: &TransportConfig) -> SessionConfig {
        let hostname = self
            .client_hostname
            .clone()
            .or_else(|| ehlo_name(&config.public_base_url))
            .unwrap_or_else(|| "localhost".to_string());

        SessionConfig::new(config.host.clone())
            .port(config.port)
            .security(config.security())
            .credentials(Credentials::new(config.username.clone(), config.secret.clone()))
            .client_hostname(hostname)
            .timeouts(self.timeouts)
    }
}

#[async_trait]
impl<C: Connector> DirectTransport for SmtpTransport<C> {
    async fn send(
        &self,
        config: &TransportConfig,
        message: &OutboundMessage,
        recipient: &Address,
    ) -> Result<()> {
        let sender = config.sender(message.from.as_deref())?;
        let envelope = Envelope {
            from: sender.address.clone(),
            to: recipient.clone(),
        };
        let body = HtmlMessage::new(
            sender,
            recipient.clone(),
            message.subject.clone(),
            message.html.clone(),
        )
        .to_bytes();

        send_mail(&self.connector, &self.session_config(config), &envelope, &body).await?;
        Ok(())
    }
}

/// EHLO argument for the host of `base_url`.
///
/// IP hosts become address literals (`[192.0.2.1]`, `[IPv6:2001:db8::1]`).
/// A value without a scheme is read as an `https` URL.
fn ehlo_name(base_url: &str) -> Option<String> {
    let url = match Url::parse(base_url) {
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{base_url}")),
        parsed => parsed,
    }
    .ok()?;
    match url.host()? {
        Host::Domain(domain) if !domain.is_empty() => Some(domain.to_string()),
        Host::Domain(_) => None,
        Host::Ipv4(addr) => Some(format!("[{addr}]")),
        Host::Ipv6(addr) => Some(format!("[IPv6:{addr}]")),
    }
}
