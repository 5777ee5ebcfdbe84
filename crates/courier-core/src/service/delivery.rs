//! Delivery orchestration.

use std::borrow::Cow;
use std::sync::Arc;

use chrono::Utc;
use courier_smtp::Address;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::Instrument;

use crate::config::{ConfigResolver, SettingsSource, TransportConfig};
use crate::direct::DirectTransport;
use crate::fallback::FallbackProvider;
use crate::log::{DeliveryLog, DeliveryLogEntry, DeliveryMethod, DeliveryStatus};
use crate::{Error, Result};

/// A message handed to [`Mailer::send`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Recipient addresses. Accepts a single string or an array in JSON.
    #[serde(deserialize_with = "one_or_many")]
    pub to: Vec<String>,
    /// Subject line (any Unicode).
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Sender address override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Free-form tag used for logging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl OutboundMessage {
    /// Creates a message.
    #[must_use]
    pub fn new<I, T>(to: I, subject: impl Into<String>, html: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            to: to.into_iter().map(Into::into).collect(),
            subject: subject.into(),
            html: html.into(),
            from: None,
            category: None,
        }
    }

    /// Sets the sender address override.
    #[must_use]
    pub fn sender(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Sets the category tag.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Parses and validates the recipient list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] if there is no recipient or an
    /// address is malformed.
    pub fn recipients(&self) -> Result<Vec<Address>> {
        if self.to.is_empty() {
            return Err(Error::InvalidMessage("no recipients".into()));
        }
        self.to
            .iter()
            .map(|to| {
                Address::new(to.as_str())
                    .map_err(|e| Error::InvalidMessage(format!("recipient {to:?}: {e}")))
            })
            .collect()
    }

    fn with_recipients(&self, to: Vec<String>) -> Self {
        Self {
            to,
            ..self.clone()
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(to) => vec![to],
        OneOrMany::Many(to) => to,
    })
}

/// Outcome of [`Mailer::send`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Whether the message was delivered.
    pub success: bool,
    /// Path used last.
    pub method: DeliveryMethod,
    /// Direct-path error (also set when the fallback then succeeded), or the
    /// provider error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Which recipients the fallback receives after a direct failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackScope {
    /// Resend to the whole list, including recipients the direct path
    /// already delivered to. Those recipients may get the message twice.
    #[default]
    AllRecipients,
    /// Resend only to recipients the direct path did not complete.
    UndeliveredOnly,
}

/// Direct attempt that stopped at a recipient.
struct DirectFailure {
    error: Error,
    delivered: usize,
}

/// The delivery orchestrator.
pub struct Mailer<S> {
    resolver: ConfigResolver<S>,
    direct: Arc<dyn DirectTransport>,
    fallback: Arc<dyn FallbackProvider>,
    log: DeliveryLog,
    scope: FallbackScope,
}

impl<S> std::fmt::Debug for Mailer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("fallback", &self.fallback.name())
            .field("log", &self.log)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl<S: SettingsSource> Mailer<S> {
    /// Creates a mailer with [`FallbackScope::AllRecipients`].
    pub fn new(
        resolver: ConfigResolver<S>,
        direct: impl DirectTransport + 'static,
        fallback: impl FallbackProvider + 'static,
        log: DeliveryLog,
    ) -> Self {
        Self {
            resolver,
            direct: Arc::new(direct),
            fallback: Arc::new(fallback),
            log,
            scope: FallbackScope::default(),
        }
    }

    /// Sets which recipients the fallback receives after a direct failure.
    #[must_use]
    pub const fn fallback_scope(mut self, scope: FallbackScope) -> Self {
        self.scope = scope;
        self
    }

    /// Configuration resolver, e.g. to invalidate after a settings change.
    #[must_use]
    pub const fn resolver(&self) -> &ConfigResolver<S> {
        &self.resolver
    }

    /// Delivery log recorder.
    #[must_use]
    pub const fn log(&self) -> &DeliveryLog {
        &self.log
    }

    /// Delivers a message.
    ///
    /// Uses the direct SMTP path when it is enabled and fully configured,
    /// falling back to the provider if any recipient fails. Transport
    /// failures are reported in the returned [`DeliveryResult`]. Exactly one
    /// log entry is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] for a message without recipients or
    /// with a malformed address, and the resolver's error if the
    /// configuration cannot be loaded. Nothing is sent or logged then.
    pub async fn send(&self, message: &OutboundMessage) -> Result<DeliveryResult> {
        let recipients = message.recipients()?;
        if let Some(from) = &message.from {
            Address::new(from.as_str())
                .map_err(|e| Error::InvalidMessage(format!("sender {from:?}: {e}")))?;
        }
        let config = self.resolver.get().await?;

        let span = tracing::info_span!(
            "deliver",
            recipients = recipients.len(),
            category = message.category.as_deref().unwrap_or("-"),
        );
        Ok(self
            .deliver(&config, message, &recipients)
            .instrument(span)
            .await)
    }

    async fn deliver(
        &self,
        config: &TransportConfig,
        message: &OutboundMessage,
        recipients: &[Address],
    ) -> DeliveryResult {
        let mut metadata = serde_json::json!({
            "recipients": recipients.len(),
            "direct_attempted": config.direct_enabled(),
            "provider": self.fallback.name(),
        });

        let (result, status) = if config.direct_enabled() {
            match self.send_direct(config, message, recipients).await {
                Ok(()) => (
                    DeliveryResult {
                        success: true,
                        method: DeliveryMethod::Direct,
                        error: None,
                    },
                    DeliveryStatus::Success,
                ),
                Err(failure) => {
                    metadata["delivered_direct"] = failure.delivered.into();
                    self.rescue(config, message, failure, &mut metadata).await
                }
            }
        } else {
            match self.fallback.send(message, &config.sender_name).await {
                Ok(()) => (
                    DeliveryResult {
                        success: true,
                        method: DeliveryMethod::Fallback,
                        error: None,
                    },
                    DeliveryStatus::Success,
                ),
                Err(e) => (
                    DeliveryResult {
                        success: false,
                        method: DeliveryMethod::Fallback,
                        error: Some(e.to_string()),
                    },
                    DeliveryStatus::Failed,
                ),
            }
        };

        if result.success {
            tracing::info!(method = %result.method, %status, "Message delivered");
        } else {
            tracing::warn!(
                method = %result.method,
                error = result.error.as_deref().unwrap_or_default(),
                "Message not delivered"
            );
        }

        self.log
            .record(DeliveryLogEntry {
                recipient: message.to.join(", "),
                subject: message.subject.clone(),
                category: message.category.clone(),
                method: result.method,
                status,
                error: result.error.clone(),
                metadata,
                created_at: Utc::now(),
            })
            .await;

        result
    }

    /// One full session per recipient, in order, stopping at the first
    /// failure.
    async fn send_direct(
        &self,
        config: &TransportConfig,
        message: &OutboundMessage,
        recipients: &[Address],
    ) -> std::result::Result<(), DirectFailure> {
        for (delivered, recipient) in recipients.iter().enumerate() {
            if let Err(error) = self.direct.send(config, message, recipient).await {
                tracing::warn!(%recipient, error = %error, "Direct delivery failed");
                return Err(DirectFailure { error, delivered });
            }
            tracing::debug!(%recipient, "Direct delivery accepted");
        }
        Ok(())
    }

    async fn rescue(
        &self,
        config: &TransportConfig,
        message: &OutboundMessage,
        failure: DirectFailure,
        metadata: &mut serde_json::Value,
    ) -> (DeliveryResult, DeliveryStatus) {
        let direct_error = format!("SMTP failed: {}", failure.error);

        let retry = match self.scope {
            FallbackScope::AllRecipients => Cow::Borrowed(message),
            FallbackScope::UndeliveredOnly => Cow::Owned(
                message.with_recipients(message.to[failure.delivered..].to_vec()),
            ),
        };
        metadata["fallback_recipients"] = retry.to.len().into();
        tracing::info!(
            provider = self.fallback.name(),
            recipients = retry.to.len(),
            "Falling back to provider"
        );

        match self.fallback.send(&retry, &config.sender_name).await {
            Ok(()) => (
                DeliveryResult {
                    success: true,
                    method: DeliveryMethod::Fallback,
                    error: Some(direct_error),
                },
                DeliveryStatus::Fallback,
            ),
            Err(e) => (
                DeliveryResult {
                    success: false,
                    method: DeliveryMethod::Fallback,
                    error: Some(format!("{direct_error}; fallback failed: {e}")),
                },
                DeliveryStatus::Failed,
            ),
        }
    }
}
