//! In-flight batch state

use crate::core::types::{Batch, Delivery, FlushTrigger};
use crate::utils::error::{ConsumerError, Result};
use std::time::{Duration, Instant};

/// Holds the deliveries received since the last flush
///
/// `len()` never exceeds the prefetch count between calls. Taking a batch swaps the
/// buffer for an empty one in a single step, so a delivery can only ever leave
/// through one batch.
#[derive(Debug)]
pub struct BatchAccumulator {
    queue_name: String,
    capacity: usize,
    pending: Vec<Delivery>,
    first_pending_at: Option<Instant>,
}

impl BatchAccumulator {
    /// Create an accumulator flushing every `prefetch_count` deliveries
    pub fn new(queue_name: impl Into<String>, prefetch_count: u16) -> Result<Self> {
        let queue_name = queue_name.into();
        if prefetch_count == 0 {
            return Err(ConsumerError::configuration(format!(
                "prefetch_count for queue '{}' must be at least 1",
                queue_name
            )));
        }

        let capacity = usize::from(prefetch_count);
        Ok(Self {
            queue_name,
            capacity,
            pending: Vec::with_capacity(capacity),
            first_pending_at: None,
        })
    }

    /// Append a delivery; returns the full batch once the threshold is reached
    pub fn offer(&mut self, delivery: Delivery) -> Option<Batch> {
        if self.pending.is_empty() {
            self.first_pending_at = Some(Instant::now());
        }
        self.pending.push(delivery);

        if self.pending.len() >= self.capacity {
            self.take(FlushTrigger::Count)
        } else {
            None
        }
    }

    /// Take whatever is pending as a batch; `None` when nothing is pending
    pub fn take(&mut self, trigger: FlushTrigger) -> Option<Batch> {
        if self.pending.is_empty() {
            return None;
        }

        self.first_pending_at = None;
        let deliveries = std::mem::replace(&mut self.pending, Vec::with_capacity(self.capacity));
        Some(Batch::new(self.queue_name.clone(), trigger, deliveries))
    }

    /// Drop pending deliveries without flushing; returns how many were dropped
    pub fn discard(&mut self) -> usize {
        self.first_pending_at = None;
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// How long the oldest pending delivery has been waiting
    pub fn pending_for(&self) -> Option<Duration> {
        self.first_pending_at.map(|at| at.elapsed())
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
