//! Memoized configuration access.

use std::sync::{Arc, PoisonError, RwLock};

use super::model::TransportConfig;
use super::source::SettingsSource;
use crate::Result;

/// Loads [`TransportConfig`] once and serves the cached copy afterwards.
///
/// Each resolver owns its own cache, so independent resolvers (for example
/// one per test) never see each other's settings. Two callers racing on an
/// empty cache may both load; the last one stores its result.
#[derive(Debug)]
pub struct ConfigResolver<S> {
    source: S,
    cached: RwLock<Option<Arc<TransportConfig>>>,
}

impl<S: SettingsSource> ConfigResolver<S> {
    /// Creates a resolver with an empty cache.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// Returns the configuration, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or the settings are
    /// invalid. Failures are not cached.
    pub async fn get(&self) -> Result<Arc<TransportConfig>> {
        if let Some(config) = self.peek() {
            return Ok(config);
        }

        let settings = self.source.load().await?;
        let config = Arc::new(TransportConfig::from_settings(&settings)?);
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&config));

        tracing::debug!(
            enabled = config.enabled,
            host = %config.host,
            port = config.port,
            "Transport configuration loaded"
        );
        Ok(config)
    }

    /// Clears the cache; the next [`get`](Self::get) reloads.
    pub fn invalidate(&self) {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::debug!("Transport configuration invalidated");
    }

    /// Returns true if a configuration is cached.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.peek().is_some()
    }

    /// Underlying settings source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    fn peek(&self) -> Option<Arc<TransportConfig>> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
