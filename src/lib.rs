//! # amqp-batch-consumer
//!
//! Batching consumer for message-broker subscriptions. Deliveries from one
//! queue are accumulated into bounded batches and handed to an application
//! handler through an ordered pipeline of filters; a batch is acknowledged
//! only after the handler succeeds.
//!
//! ## Features
//!
//! - **Exact batch boundaries**: a batch is flushed when it reaches the
//!   prefetch count, when the handling period elapses, or when the consumer
//!   stops
//! - **Filter pipeline**: cross-cutting filters wrap the handler; the last
//!   registered filter runs first
//! - **At-least-once**: deliveries are acknowledged individually, in receive
//!   order, after a successful handler call; failed batches are left to the
//!   broker for redelivery
//! - **Graceful lifecycle**: start/stop with cancellation, bounded drain on stop
//! - **Pluggable broker**: any broker behind [`ConnectionFactory`]; an
//!   in-memory broker ships with the crate
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use amqp_batch_consumer::{
//!     BatchConsumer, BatchConsumerOptions, InMemoryBroker, TracingFilter, handler_fn,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = InMemoryBroker::new();
//!     let options = BatchConsumerOptions::new("orders", 50)
//!         .with_handling_period(Duration::from_millis(500));
//!
//!     let consumer = BatchConsumer::builder(options)
//!         .connection_factory(Arc::new(broker.clone()))
//!         .filter(TracingFilter::new())
//!         .handler(handler_fn(|batch, _cancel| async move {
//!             println!("got {} messages", batch.len());
//!             Ok(())
//!         }))
//!         .build()?;
//!
//!     consumer.start(&CancellationToken::new()).await?;
//!     broker.publish("orders", "hello");
//!     consumer.stop(&CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod utils;

// Re-export main types
pub use config::{BatchConsumerOptions, Config, ConnectionOptions, LoggingConfig};
pub use utils::error::{ConsumerError, HandlerError, HandlerResult, Result};
pub use utils::logging::init_logging;

// Export the consumer engine
pub use core::batch::{BatchAccumulator, BatchDispatcher, FlushReport};
pub use core::broker::InMemoryBroker;
pub use core::consumer::{BatchConsumer, BatchConsumerBuilder, StatsSnapshot};
pub use core::filters::{FilterDecision, PredicateFilter, TracingFilter};
pub use core::pipeline::{FilterPipeline, Next};
pub use core::traits::{
    BatchFilter, BatchMessageHandler, BrokerConnection, ConnectionFactory, DeliveryStream,
    handler_fn,
};
pub use core::types::{Batch, Delivery, DeliveryProperties, FlushTrigger, HandlerState};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Description of the crate
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
