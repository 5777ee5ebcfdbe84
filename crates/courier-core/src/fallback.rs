//! HTTP mail API fallback.
//!
//! Used as the only path when direct SMTP is disabled, and as the rescue
//! path after a direct failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::service::OutboundMessage;
use crate::{Error, Result};

/// Default API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.resend.com/emails";

/// Environment variable holding the API key by default.
pub const DEFAULT_API_KEY_ENV: &str = "RESEND_API_KEY";

/// Default sender address when the message carries none.
pub const DEFAULT_SENDER_ADDRESS: &str = "notifications@courier.example.com";

/// Longest response body excerpt kept in a provider error.
const MAX_ERROR_BODY: usize = 200;

/// A secondary delivery path.
#[async_trait]
pub trait FallbackProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Sends the message to all of its recipients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the provider is not configured and
    /// [`Error::Provider`] if the provider does not report success.
    async fn send(&self, message: &OutboundMessage, sender_name: &str) -> Result<()>;
}

#[async_trait]
impl<T: FallbackProvider + ?Sized> FallbackProvider for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn send(&self, message: &OutboundMessage, sender_name: &str) -> Result<()> {
        (**self).send(message, sender_name).await
    }
}

/// Settings for [`HttpApiProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpProviderConfig {
    /// URL the message is posted to.
    pub endpoint: String,
    /// Environment variable read for the bearer token.
    pub api_key_env: String,
    /// Sender address used when the message has no override.
    pub sender_address: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            sender_address: DEFAULT_SENDER_ADDRESS.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl HttpProviderConfig {
    /// Sets the endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the API key environment variable name.
    #[must_use]
    pub fn api_key_env(mut self, name: impl Into<String>) -> Self {
        self.api_key_env = name.into();
        self
    }

    /// Sets the default sender address.
    #[must_use]
    pub fn sender_address(mut self, address: impl Into<String>) -> Self {
        self.sender_address = address.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// JSON mail API client (Resend-compatible).
#[derive(Debug, Clone)]
pub struct HttpApiProvider {
    http_client: Client,
    config: HttpProviderConfig,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: String,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<Tag>,
}

#[derive(Serialize)]
struct Tag {
    name: &'static str,
    value: String,
}

#[derive(Deserialize)]
struct SendResponse {
    id: Option<String>,
}

impl HttpApiProvider {
    /// Creates a provider; the API key is read from the environment on
    /// every send.
    #[must_use]
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            http_client: Client::new(),
            config,
            api_key: None,
        }
    }

    /// Uses a fixed API key instead of the environment.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Provider settings.
    #[must_use]
    pub const fn config(&self) -> &HttpProviderConfig {
        &self.config
    }

    fn api_key(&self) -> Result<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        std::env::var(&self.config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "fallback provider API key missing ({} is not set)",
                    self.config.api_key_env
                ))
            })
    }

    fn request<'a>(&self, message: &'a OutboundMessage, sender_name: &str) -> SendRequest<'a> {
        let address = message
            .from
            .as_deref()
            .unwrap_or(&self.config.sender_address);
        let from = from_header(sender_name, address);

        SendRequest {
            from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
            tags: message
                .category
                .as_deref()
                .map(|category| Tag {
                    name: "category",
                    value: tag_value(category),
                })
                .into_iter()
                .collect(),
        }
    }
}

#[async_trait]
impl FallbackProvider for HttpApiProvider {
    fn name(&self) -> &str {
        "http-api"
    }

    async fn send(&self, message: &OutboundMessage, sender_name: &str) -> Result<()> {
        let api_key = self.api_key()?;
        let body = self.request(message, sender_name);

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "{status}: {}",
                excerpt(&text, MAX_ERROR_BODY)
            )));
        }

        let id = response
            .json::<SendResponse>()
            .await
            .ok()
            .and_then(|r| r.id);
        tracing::debug!(
            recipients = message.to.len(),
            id = id.as_deref().unwrap_or("-"),
            "Fallback provider accepted message"
        );
        Ok(())
    }
}

/// Tag values may only contain ASCII letters, digits, `_` and `-`.
fn tag_value(category: &str) -> String {
    category
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn excerpt(text: &str, max: usize) -> &str {
    let text = text.trim();
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// `Name <address>`, quoting the name when it contains RFC 5322 specials.
fn from_header(sender_name: &str, address: &str) -> String {
    let name = sender_name.trim();
    if name.is_empty() {
        return address.to_string();
    }
    let needs_quotes = name
        .chars()
        .any(|c| c.is_control() || "()<>[]:;@\\,.\"".contains(c));
    if needs_quotes {
        let mut escaped = String::with_capacity(name.len());
        for c in name.chars().filter(|c| !c.is_control()) {
            if matches!(c, '"' | '\\') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        format!("\"{escaped}\" <{address}>")
    } else {
        format!("{name} <{address}>")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct Captured {
        head: String,
        body: serde_json::Value,
    }

    /// Serves one HTTP request with the given status and body.
    async fn serve_once(
        status: &'static str,
        reply: &'static str,
    ) -> (String, tokio::task::JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/emails", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8(buf[..header_end].to_vec()).unwrap();
            let length: usize = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse().ok())
                        .flatten()
                })
                .unwrap_or(0);
            while buf.len() < header_end + length {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending body");
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                reply.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            Captured {
                head,
                body: serde_json::from_slice(&buf[header_end..header_end + length]).unwrap(),
            }
        });

        (url, handle)
    }

    fn message() -> OutboundMessage {
        OutboundMessage::new(["a@example.com", "b@example.com"], "Ticket #42", "<p>Hi</p>")
            .category("ticket reply")
    }

    #[test]
    fn sender_names_with_specials_are_quoted() {
        assert_eq!(from_header("Help Desk", "a@example.com"), "Help Desk <a@example.com>");
        assert_eq!(from_header("  ", "a@example.com"), "a@example.com");
        assert_eq!(
            from_header("Acme, Inc.", "a@example.com"),
            "\"Acme, Inc.\" <a@example.com>"
        );
        assert_eq!(
            from_header("Bob \"The Builder\" <ops>", "a@example.com"),
            "\"Bob \\\"The Builder\\\" <ops>\" <a@example.com>"
        );
        assert_eq!(from_header("back\\slash.", "a@example.com"), "\"back\\\\slash.\" <a@example.com>");
    }

    #[tokio::test]
    async fn posts_json_with_bearer_token() {
        let (url, server) = serve_once("200 OK", r#"{"id":"msg_123"}"#).await;
        let provider = HttpApiProvider::new(
            HttpProviderConfig::default()
                .endpoint(url)
                .sender_address("noreply@example.com"),
        )
        .with_api_key("re_test");

        provider.send(&message(), "Help Desk").await.unwrap();

        let captured = server.await.unwrap();
        assert!(captured.head.starts_with("POST /emails HTTP/1.1"));
        assert!(
            captured
                .head
                .to_ascii_lowercase()
                .contains("authorization: bearer re_test")
        );
        assert_eq!(
            captured.body,
            serde_json::json!({
                "from": "Help Desk <noreply@example.com>",
                "to": ["a@example.com", "b@example.com"],
                "subject": "Ticket #42",
                "html": "<p>Hi</p>",
                "tags": [{"name": "category", "value": "ticket_reply"}],
            })
        );
    }

    #[tokio::test]
    async fn sender_override_is_used() {
        let (url, server) = serve_once("200 OK", "{}").await;
        let provider =
            HttpApiProvider::new(HttpProviderConfig::default().endpoint(url)).with_api_key("k");
        let message = OutboundMessage::new(["a@example.com"], "Hi", "<p>x</p>")
            .sender("billing@example.com");

        provider.send(&message, "").await.unwrap();

        let captured = server.await.unwrap();
        assert_eq!(captured.body["from"], "billing@example.com");
        assert!(captured.body.get("tags").is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_provider_error() {
        let (url, server) = serve_once("422 Unprocessable Entity", r#"{"message":"invalid from"}"#).await;
        let provider =
            HttpApiProvider::new(HttpProviderConfig::default().endpoint(url)).with_api_key("k");

        let err = provider.send(&message(), "Courier").await.unwrap_err();
        server.await.unwrap();
        match err {
            Error::Provider(text) => {
                assert!(text.contains("422"), "{text}");
                assert!(text.contains("invalid from"), "{text}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_api_key_is_config_error() {
        let provider = HttpApiProvider::new(
            HttpProviderConfig::default()
                .endpoint("http://127.0.0.1:9/emails")
                .api_key_env("COURIER_TEST_KEY_THAT_IS_NEVER_SET"),
        );
        let err = provider.send(&message(), "Courier").await.unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("COURIER_TEST_KEY_THAT_IS_NEVER_SET")));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_provider_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = HttpApiProvider::new(
            HttpProviderConfig::default().endpoint(format!("http://{addr}/emails")),
        )
        .with_api_key("k");
        let err = provider.send(&message(), "Courier").await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("  short  ", 10), "short");
        assert_eq!(excerpt("ééé", 3), "é");
    }
}
