//! Broker collaborator traits
//!
//! The consumer never talks to a broker directly. Connection establishment,
//! credentials and topology belong to whoever implements these traits.

use crate::config::models::ConnectionOptions;
use crate::core::types::Delivery;
use crate::utils::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Push-based delivery stream for one consumer registration
///
/// An `Err` item reports a connection or channel fault; the end of the stream
/// means the broker cancelled the consumer.
pub type DeliveryStream = BoxStream<'static, Result<Delivery>>;

/// Opens broker connections
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Open a connection (and channel) using the given options
    async fn open_connection(&self, options: &ConnectionOptions)
    -> Result<Arc<dyn BrokerConnection>>;
}

/// An open connection/channel pair
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Set QoS to `prefetch_count` and register a consumer on `queue_name`
    async fn create_consumer(
        &self,
        queue_name: &str,
        prefetch_count: u16,
        consumer_tag: &str,
    ) -> Result<DeliveryStream>;

    /// Acknowledge one delivery, or every delivery up to the tag when `multiple`
    async fn acknowledge(&self, delivery_tag: u64, multiple: bool) -> Result<()>;

    /// Cancel consumers and close the channel and connection
    async fn close(&self) -> Result<()>;

    /// Whether the connection is still usable
    fn is_open(&self) -> bool;
}
