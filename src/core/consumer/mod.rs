//! Batch consumer
//!
//! [`BatchConsumer`] owns the lifecycle; a private intake task owns the batch
//! while the consumer runs.

mod intake;
mod lifecycle;
mod stats;


pub use lifecycle::{BatchConsumer, BatchConsumerBuilder};
pub use stats::{ConsumerStats, StatsSnapshot};
