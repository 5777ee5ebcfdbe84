//! Delivery service.
//!
//! [`Mailer`] is the entry point callers use: it picks the direct SMTP path
//! or the HTTP fallback, records one log entry and always answers with a
//! [`DeliveryResult`].

pub mod delivery;

pub use delivery::{DeliveryResult, FallbackScope, Mailer, OutboundMessage};
