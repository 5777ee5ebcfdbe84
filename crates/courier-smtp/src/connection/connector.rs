//! Socket establishment and TLS negotiation.

use super::stream::with_deadline;
use super::{BoxedIo, Timeouts};
use crate::error::{Error, Result};
use async_trait::async_trait;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

/// Opens sockets and wraps them in TLS.
///
/// Sessions only ever talk to a `Connector`, so the transport variant
/// (explicit or implicit TLS) is a matter of which calls are made, and tests
/// can substitute scripted streams.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a plaintext connection.
    async fn connect(&self, host: &str, port: u16, timeouts: &Timeouts) -> Result<BoxedIo>;

    /// Performs a TLS client handshake over an open connection.
    async fn upgrade(&self, io: BoxedIo, host: &str, timeouts: &Timeouts) -> Result<BoxedIo>;
}

/// TCP + rustls connector validating servers against the webpki roots.
#[derive(Clone)]
pub struct RustlsConnector {
    tls: TlsConnector,
}

impl std::fmt::Debug for RustlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustlsConnector").finish_non_exhaustive()
    }
}

impl RustlsConnector {
    /// Creates a connector trusting the bundled webpki root certificates.
    ///
    /// The `aws-lc-rs` provider is selected explicitly, so the result does
    /// not depend on which rustls providers other crates enable.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider supports none of the default
    /// protocol versions.
    pub fn new() -> Result<Self> {
        let root_store = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Self::with_config(Arc::new(config)))
    }

    /// Creates a connector from a custom rustls client configuration.
    #[must_use]
    pub fn with_config(config: Arc<ClientConfig>) -> Self {
        Self {
            tls: TlsConnector::from(config),
        }
    }
}

#[async_trait]
impl Connector for RustlsConnector {
    async fn connect(&self, host: &str, port: u16, timeouts: &Timeouts) -> Result<BoxedIo> {
        let stream = with_deadline("connect", timeouts.connect, TcpStream::connect((host, port)))
            .await?
            .map_err(|e| Error::Connection {
                target: format!("{host}:{port}"),
                reason: e.to_string(),
            })?;
        // Commands are tiny and strictly request/response.
        stream.set_nodelay(true)?;

        tracing::debug!(host, port, "TCP connection established");
        Ok(Box::new(stream))
    }

    async fn upgrade(&self, io: BoxedIo, host: &str, timeouts: &Timeouts) -> Result<BoxedIo> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::Protocol(format!("Invalid hostname: {host}")))?;

        let tls_stream = with_deadline(
            "TLS handshake",
            timeouts.handshake,
            self.tls.connect(server_name, io),
        )
        .await?
        .map_err(|e| Error::Connection {
            target: host.to_string(),
            reason: format!("TLS handshake failed: {e}"),
        })?;

        tracing::debug!(host, "TLS session established");
        Ok(Box::new(tls_stream))
    }
}
