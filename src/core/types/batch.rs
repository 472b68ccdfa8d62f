//! Flushed batch of deliveries

use super::delivery::Delivery;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What caused a batch to be flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushTrigger {
    /// The batch reached the prefetch count
    Count,
    /// The handling period elapsed
    Timer,
    /// Final flush while the consumer stops
    Shutdown,
}

impl std::fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushTrigger::Count => write!(f, "count"),
            FlushTrigger::Timer => write!(f, "timer"),
            FlushTrigger::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Ordered group of deliveries handed to the pipeline in one call
///
/// Deliveries keep the order in which they were received.
#[derive(Debug, Clone)]
pub struct Batch {
    id: Uuid,
    queue_name: String,
    trigger: FlushTrigger,
    deliveries: Vec<Delivery>,
}

impl Batch {
    pub fn new(queue_name: impl Into<String>, trigger: FlushTrigger, deliveries: Vec<Delivery>) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue_name: queue_name.into(),
            trigger,
            deliveries,
        }
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    #[inline]
    pub fn trigger(&self) -> FlushTrigger {
        self.trigger
    }

    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Delivery> {
        self.deliveries.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    /// Delivery tags in receive order
    pub fn delivery_tags(&self) -> Vec<u64> {
        self.deliveries.iter().map(|d| d.delivery_tag).collect()
    }

    /// Highest delivery tag in the batch
    pub fn last_delivery_tag(&self) -> Option<u64> {
        self.deliveries.last().map(|d| d.delivery_tag)
    }

    /// Total payload size in bytes
    pub fn payload_bytes(&self) -> usize {
        self.deliveries.iter().map(Delivery::len).sum()
    }

    pub fn into_deliveries(self) -> Vec<Delivery> {
        self.deliveries
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Delivery;
    type IntoIter = std::slice::Iter<'a, Delivery>;

    fn into_iter(self) -> Self::IntoIter {
        self.deliveries.iter()
    }
}
