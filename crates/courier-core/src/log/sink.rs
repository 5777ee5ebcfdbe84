//! Delivery log sinks and the best-effort recorder.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::model::DeliveryLogEntry;
use super::repository::DeliveryLogRepository;
use crate::Result;

/// Destination for delivery log entries.
#[async_trait]
pub trait DeliveryLogSink: Send + Sync {
    /// Persists one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry could not be stored.
    async fn write(&self, entry: &DeliveryLogEntry) -> Result<()>;
}

#[async_trait]
impl<T: DeliveryLogSink + ?Sized> DeliveryLogSink for Arc<T> {
    async fn write(&self, entry: &DeliveryLogEntry) -> Result<()> {
        (**self).write(entry).await
    }
}

#[async_trait]
impl DeliveryLogSink for DeliveryLogRepository {
    async fn write(&self, entry: &DeliveryLogEntry) -> Result<()> {
        self.append(entry).await.map(|_| ())
    }
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<DeliveryLogEntry>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<DeliveryLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DeliveryLogSink for MemorySink {
    async fn write(&self, entry: &DeliveryLogEntry) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(())
    }
}

/// Best-effort recorder in front of a sink.
///
/// [`record`](Self::record) never fails. A sink error is logged at warn
/// level and counted in [`failures`](Self::failures).
pub struct DeliveryLog {
    sink: Arc<dyn DeliveryLogSink>,
    failures: AtomicU64,
}

impl std::fmt::Debug for DeliveryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryLog")
            .field("failures", &self.failures())
            .finish_non_exhaustive()
    }
}

impl DeliveryLog {
    /// Wraps a sink.
    pub fn new(sink: impl DeliveryLogSink + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            failures: AtomicU64::new(0),
        }
    }

    /// Writes an entry, swallowing (and counting) any failure.
    pub async fn record(&self, entry: DeliveryLogEntry) {
        if let Err(e) = self.sink.write(&entry).await {
            let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(
                error = %e,
                recipient = %entry.recipient,
                status = %entry.status,
                failures,
                "Failed to record delivery log entry"
            );
        }
    }

    /// Number of entries that could not be written.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
