//! # courier-core
//!
//! Mail delivery for transactional and bulk messages.
//!
//! This crate provides:
//! - Transport configuration loaded from a key/value settings store and
//!   memoized per [`ConfigResolver`]
//! - The direct SMTP path on top of `courier-smtp`
//! - An HTTP mail API fallback provider
//! - The delivery orchestrator, [`Mailer`]
//! - An append-only delivery log (`SQLite`)
//!
//! ```no_run
//! use courier_core::{
//!     ConfigResolver, DeliveryLog, DeliveryLogRepository, HttpApiProvider, HttpProviderConfig,
//!     Mailer, OutboundMessage, SettingsRepository, SmtpTransport,
//! };
//!
//! # async fn example() -> courier_core::Result<()> {
//! let settings = SettingsRepository::new("courier.db").await?;
//! let log = DeliveryLogRepository::new("courier.db").await?;
//! let mailer = Mailer::new(
//!     ConfigResolver::new(settings),
//!     SmtpTransport::rustls()?,
//!     HttpApiProvider::new(HttpProviderConfig::default()),
//!     DeliveryLog::new(log),
//! );
//!
//! let message = OutboundMessage::new(["customer@example.org"], "Welcome", "<p>Hello</p>");
//! let result = mailer.send(&message).await?;
//! println!("delivered via {}: {}", result.method, result.success);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod direct;
mod error;
pub mod fallback;
pub mod log;
pub mod service;

pub use config::{
    ConfigResolver, Encryption, SettingsRepository, SettingsSource, StaticSettings,
    TransportConfig,
};
pub use direct::{DirectTransport, SmtpTransport};
pub use error::{Error, Result};
pub use fallback::{FallbackProvider, HttpApiProvider, HttpProviderConfig};
pub use log::{
    DeliveryLog, DeliveryLogEntry, DeliveryLogRepository, DeliveryLogSink, DeliveryMethod,
    DeliveryStatus, MemorySink,
};
pub use service::{DeliveryResult, FallbackScope, Mailer, OutboundMessage};
