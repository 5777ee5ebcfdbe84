//! Delivery log model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Path that delivered (or last attempted) a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    /// Direct SMTP submission.
    Direct,
    /// HTTP mail API.
    Fallback,
}

impl DeliveryMethod {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Fallback => "fallback",
        }
    }

    /// Parses the stored representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Self::Direct),
            "fallback" => Some(Self::Fallback),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Delivered on the first path tried.
    Success,
    /// Direct path failed, fallback delivered.
    Fallback,
    /// Nothing delivered.
    Failed,
}

impl DeliveryStatus {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fallback => "fallback",
            Self::Failed => "failed",
        }
    }

    /// Parses the stored representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "fallback" => Some(Self::Fallback),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only audit record of one send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    /// Recipient addresses, comma separated.
    pub recipient: String,
    /// Message subject.
    pub subject: String,
    /// Caller-supplied category tag.
    pub category: Option<String>,
    /// Path actually used last.
    pub method: DeliveryMethod,
    /// Outcome.
    pub status: DeliveryStatus,
    /// Error text, if any path failed.
    pub error: Option<String>,
    /// Free-form details.
    pub metadata: serde_json::Value,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}
