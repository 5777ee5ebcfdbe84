//! Transport configuration model.

use std::collections::HashMap;

use courier_smtp::{Mailbox, Security};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Setting keys read from the settings store.
pub mod keys {
    /// Whether the direct SMTP path is enabled.
    pub const ENABLED: &str = "smtp_enabled";
    /// SMTP server hostname.
    pub const HOST: &str = "smtp_host";
    /// SMTP server port.
    pub const PORT: &str = "smtp_port";
    /// Login name for `AUTH LOGIN`.
    pub const USERNAME: &str = "smtp_username";
    /// Secret for `AUTH LOGIN`.
    pub const PASSWORD: &str = "smtp_password";
    /// Envelope and `From` address.
    pub const SENDER_EMAIL: &str = "smtp_sender_email";
    /// Display name in `From`.
    pub const SENDER_NAME: &str = "smtp_sender_name";
    /// `tls` or `ssl`.
    pub const ENCRYPTION: &str = "smtp_encryption";
    /// Public URL of the product, used by callers to build links.
    pub const PUBLIC_BASE_URL: &str = "public_base_url";

    /// Every key the transport reads.
    pub const ALL: [&str; 9] = [
        ENABLED,
        HOST,
        PORT,
        USERNAME,
        PASSWORD,
        SENDER_EMAIL,
        SENDER_NAME,
        ENCRYPTION,
        PUBLIC_BASE_URL,
    ];
}

/// Port used when `smtp_port` is not set.
pub const DEFAULT_PORT: u16 = 587;

/// Sender display name used when `smtp_sender_name` is not set.
pub const DEFAULT_SENDER_NAME: &str = "Courier";

/// Public base URL used when `public_base_url` is not set.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://courier.example.com";

/// Encryption setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encryption {
    /// STARTTLS on a plaintext connection.
    #[default]
    Tls,
    /// TLS from the first byte.
    Ssl,
}

impl Encryption {
    /// Parses a setting value; unknown values yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tls" => Some(Self::Tls),
            "ssl" => Some(Self::Ssl),
            _ => None,
        }
    }

    /// Setting value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tls => "tls",
            Self::Ssl => "ssl",
        }
    }
}

/// Resolved mail-transport configuration.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct TransportConfig {
    /// Whether the direct SMTP path may be used.
    pub enabled: bool,
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Login name.
    pub username: String,
    /// Login secret.
    #[serde(skip)]
    pub secret: String,
    /// Envelope and `From` address.
    pub sender_address: String,
    /// `From` display name.
    pub sender_name: String,
    /// Encryption setting, `None` when unset or unrecognized.
    pub encryption: Option<Encryption>,
    /// Public URL of the product.
    pub public_base_url: String,
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("sender_address", &self.sender_address)
            .field("sender_name", &self.sender_name)
            .field("encryption", &self.encryption)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            secret: String::new(),
            sender_address: String::new(),
            sender_name: DEFAULT_SENDER_NAME.to_string(),
            encryption: Some(Encryption::Tls),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
        }
    }
}

impl TransportConfig {
    /// Builds a configuration from raw settings, applying defaults.
    ///
    /// Missing or blank values take their default. The sender address
    /// defaults to the username.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `smtp_port` is not a positive integer.
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self> {
        let value = |key: &str| {
            settings
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let port = match value(keys::PORT) {
            None => DEFAULT_PORT,
            Some(raw) => parse_port(raw)?,
        };

        let username = value(keys::USERNAME).unwrap_or_default().to_string();
        let sender_address = value(keys::SENDER_EMAIL).map_or_else(|| username.clone(), str::to_string);

        Ok(Self {
            enabled: value(keys::ENABLED).is_some_and(parse_bool),
            host: value(keys::HOST).unwrap_or_default().to_string(),
            port,
            username,
            // Taken verbatim, not trimmed.
            secret: settings.get(keys::PASSWORD).cloned().unwrap_or_default(),
            sender_address,
            sender_name: value(keys::SENDER_NAME)
                .unwrap_or(DEFAULT_SENDER_NAME)
                .to_string(),
            encryption: value(keys::ENCRYPTION).map_or(Some(Encryption::Tls), Encryption::parse),
            public_base_url: value(keys::PUBLIC_BASE_URL)
                .unwrap_or(DEFAULT_PUBLIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Returns true when host, username and secret are all present.
    #[must_use]
    pub fn has_direct_credentials(&self) -> bool {
        !self.host.is_empty() && !self.username.is_empty() && !self.secret.is_empty()
    }

    /// Returns true when the direct SMTP path should be attempted.
    #[must_use]
    pub fn direct_enabled(&self) -> bool {
        self.enabled && self.has_direct_credentials()
    }

    /// Transport variant selected by port and encryption.
    #[must_use]
    pub fn security(&self) -> Security {
        Security::select(self.port, self.encryption.map(Encryption::as_str))
    }

    /// Sender mailbox, with an optional address override.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] if the address is not valid.
    pub fn sender(&self, address_override: Option<&str>) -> Result<Mailbox> {
        let address = address_override.unwrap_or(&self.sender_address);
        Mailbox::with_name(&self.sender_name, address)
            .map_err(|e| Error::InvalidMessage(format!("sender {address:?}: {e}")))
    }
}

fn parse_port(raw: &str) -> Result<u16> {
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(Error::Config(format!(
            "{} must be a positive integer, got {raw:?}",
            keys::PORT
        ))),
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_to_empty_settings() {
        let config = TransportConfig::from_settings(&HashMap::new()).unwrap();
        assert_eq!(config, TransportConfig::default());
        assert!(!config.enabled);
        assert_eq!(config.port, 587);
        assert_eq!(config.sender_name, "Courier");
        assert_eq!(config.encryption, Some(Encryption::Tls));
        assert_eq!(config.public_base_url, "https://courier.example.com");
        assert!(!config.direct_enabled());
    }

    #[test]
    fn sender_address_defaults_to_username() {
        let config = TransportConfig::from_settings(&settings(&[
            (keys::USERNAME, "mailer@example.com"),
        ]))
        .unwrap();
        assert_eq!(config.sender_address, "mailer@example.com");

        let config = TransportConfig::from_settings(&settings(&[
            (keys::USERNAME, "mailer@example.com"),
            (keys::SENDER_EMAIL, "noreply@example.com"),
        ]))
        .unwrap();
        assert_eq!(config.sender_address, "noreply@example.com");
    }

    #[test]
    fn port_must_be_positive_integer() {
        for bad in ["0", "-1", "abc", "70000", "58 7"] {
            let err = TransportConfig::from_settings(&settings(&[(keys::PORT, bad)])).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{bad}");
        }
        let config = TransportConfig::from_settings(&settings(&[(keys::PORT, " 465 ")])).unwrap();
        assert_eq!(config.port, 465);
    }

    #[test]
    fn enabled_flag_parsing() {
        for (raw, expected) in [("true", true), ("1", true), ("YES", true), ("false", false), ("0", false), ("maybe", false)] {
            let config = TransportConfig::from_settings(&settings(&[(keys::ENABLED, raw)])).unwrap();
            assert_eq!(config.enabled, expected, "{raw}");
        }
    }

    #[test]
    fn unknown_encryption_is_unset() {
        let config = TransportConfig::from_settings(&settings(&[(keys::ENCRYPTION, "none")])).unwrap();
        assert_eq!(config.encryption, None);
        assert_eq!(config.security(), Security::StartTls);
    }

    #[test]
    fn security_selection() {
        let cases = [
            ("587", "tls", Security::StartTls),
            ("465", "tls", Security::Implicit),
            ("587", "ssl", Security::Implicit),
            ("2525", "tls", Security::StartTls),
        ];
        for (port, encryption, expected) in cases {
            let config = TransportConfig::from_settings(&settings(&[
                (keys::PORT, port),
                (keys::ENCRYPTION, encryption),
            ]))
            .unwrap();
            assert_eq!(config.security(), expected, "{port}/{encryption}");
        }
    }

    #[test]
    fn direct_requires_all_credentials() {
        let mut pairs = vec![
            (keys::ENABLED, "true"),
            (keys::HOST, "smtp.example.com"),
            (keys::USERNAME, "mailer@example.com"),
        ];
        let config = TransportConfig::from_settings(&settings(&pairs)).unwrap();
        assert!(!config.direct_enabled());

        pairs.push((keys::PASSWORD, "s3cret"));
        let config = TransportConfig::from_settings(&settings(&pairs)).unwrap();
        assert!(config.direct_enabled());
    }

    #[test]
    fn debug_redacts_secret() {
        let config = TransportConfig::from_settings(&settings(&[(keys::PASSWORD, "hunter2")])).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn sender_mailbox() {
        let config = TransportConfig::from_settings(&settings(&[
            (keys::USERNAME, "mailer@example.com"),
            (keys::SENDER_NAME, "Help Desk"),
        ]))
        .unwrap();
        let sender = config.sender(None).unwrap();
        assert_eq!(sender.name.as_deref(), Some("Help Desk"));
        assert_eq!(sender.address.as_str(), "mailer@example.com");

        let sender = config.sender(Some("billing@example.com")).unwrap();
        assert_eq!(sender.address.as_str(), "billing@example.com");

        assert!(matches!(config.sender(Some("not an address")), Err(Error::InvalidMessage(_))));
    }
}
