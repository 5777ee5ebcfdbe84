//! Transport configuration.
//!
//! Settings are plain string key/value pairs held by an external store.
//! [`ConfigResolver`] loads them through a [`SettingsSource`], applies the
//! defaults and memoizes the typed [`TransportConfig`].

mod model;
mod resolver;
mod source;

pub use model::{
    DEFAULT_PORT, DEFAULT_PUBLIC_BASE_URL, DEFAULT_SENDER_NAME, Encryption, TransportConfig, keys,
};
pub use resolver::ConfigResolver;
pub use source::{SettingsRepository, SettingsSource, StaticSettings};
