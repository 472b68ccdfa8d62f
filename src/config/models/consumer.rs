//! Batch consumer configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of one batch consumer (one queue)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchConsumerOptions {
    /// Queue to consume from
    #[serde(default)]
    pub queue_name: String,
    /// Broker prefetch count; also the number of deliveries that triggers a flush
    #[serde(default = "default_prefetch_count")]
    pub prefetch_count: u16,
    /// Flush a partial batch after this long; `None` flushes on count only
    #[serde(
        default,
        rename = "message_handling_period_ms",
        with = "option_duration_millis"
    )]
    pub message_handling_period: Option<Duration>,
    /// Flush the pending partial batch on stop instead of discarding it
    #[serde(default = "default_drain_on_stop")]
    pub drain_on_stop: bool,
    /// How long a cancelled stop keeps waiting for the drain
    #[serde(
        default = "default_drain_timeout",
        rename = "drain_timeout_ms",
        with = "duration_millis"
    )]
    pub drain_timeout: Duration,
    /// Prefix of the consumer tag registered with the broker
    #[serde(default = "default_consumer_tag_prefix")]
    pub consumer_tag_prefix: String,
    /// Connection options handed to the connection factory
    #[serde(default)]
    pub connection: ConnectionOptions,
}

impl Default for BatchConsumerOptions {
    fn default() -> Self {
        Self {
            queue_name: String::new(),
            prefetch_count: default_prefetch_count(),
            message_handling_period: None,
            drain_on_stop: default_drain_on_stop(),
            drain_timeout: default_drain_timeout(),
            consumer_tag_prefix: default_consumer_tag_prefix(),
            connection: ConnectionOptions::default(),
        }
    }
}

impl BatchConsumerOptions {
    /// Create options for a queue with the given batch size
    pub fn new(queue_name: impl Into<String>, prefetch_count: u16) -> Self {
        Self {
            queue_name: queue_name.into(),
            prefetch_count,
            ..Default::default()
        }
    }

    /// Set the handling period after which a partial batch is flushed
    pub fn with_handling_period(mut self, period: Duration) -> Self {
        self.message_handling_period = Some(period);
        self
    }

    /// Set whether a pending partial batch is flushed on stop
    pub fn with_drain_on_stop(mut self, drain_on_stop: bool) -> Self {
        self.drain_on_stop = drain_on_stop;
        self
    }

    /// Set the bounded wait used when a stop is cancelled mid-drain
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Set connection options
    pub fn with_connection(mut self, connection: ConnectionOptions) -> Self {
        self.connection = connection;
        self
    }

    /// Handling period if the flush timer should run at all
    ///
    /// A zero period is treated like an absent one.
    pub fn effective_handling_period(&self) -> Option<Duration> {
        self.message_handling_period.filter(|p| !p.is_zero())
    }

    /// Maximum number of deliveries in one batch
    #[inline]
    pub fn batch_size(&self) -> usize {
        usize::from(self.prefetch_count)
    }
}
