//! Delivery audit log.
//!
//! One [`DeliveryLogEntry`] is recorded per send. Writes go through
//! [`DeliveryLog`], which never lets a storage failure reach the caller.

mod model;
mod repository;
mod sink;

pub use model::{DeliveryLogEntry, DeliveryMethod, DeliveryStatus};
pub use repository::DeliveryLogRepository;
pub use sink::{DeliveryLog, DeliveryLogSink, MemorySink};
