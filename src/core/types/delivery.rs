//! Broker delivery

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Basic message properties carried alongside a payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryProperties {
    /// MIME content type, e.g. `application/json`
    pub content_type: Option<String>,
    /// Producer-assigned message id
    pub message_id: Option<String>,
    /// Correlation id for request/reply flows
    pub correlation_id: Option<String>,
    /// Application headers (stringified)
    pub headers: HashMap<String, String>,
}

/// One message received from the broker
///
/// Immutable once received. The delivery tag is per-channel and increases
/// monotonically; it is what the consumer acknowledges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    /// Channel-scoped delivery tag
    pub delivery_tag: u64,
    /// Exchange the message was published to
    pub exchange: String,
    /// Routing key used at publish time
    pub routing_key: String,
    /// Whether the broker has delivered this message before
    pub redelivered: bool,
    /// Consumer tag the delivery was addressed to
    pub consumer_tag: String,
    /// Message properties
    pub properties: DeliveryProperties,
    /// Opaque payload
    pub body: Bytes,
    /// Local receive time
    pub received_at: DateTime<Utc>,
}

impl Delivery {
    /// Create a delivery with empty metadata
    pub fn new(delivery_tag: u64, body: impl Into<Bytes>) -> Self {
        Self {
            delivery_tag,
            exchange: String::new(),
            routing_key: String::new(),
            redelivered: false,
            consumer_tag: String::new(),
            properties: DeliveryProperties::default(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }

    pub fn with_routing(mut self, exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self.routing_key = routing_key.into();
        self
    }

    pub fn with_consumer_tag(mut self, consumer_tag: impl Into<String>) -> Self {
        self.consumer_tag = consumer_tag.into();
        self
    }

    pub fn with_properties(mut self, properties: DeliveryProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    /// Decode the payload as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Payload size in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
