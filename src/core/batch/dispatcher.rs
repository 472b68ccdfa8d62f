//! Flush execution: pipeline, then acknowledgment

use super::accumulator::BatchAccumulator;
use crate::core::consumer::ConsumerStats;
use crate::core::pipeline::FilterPipeline;
use crate::core::traits::BrokerConnection;
use crate::core::types::{Batch, Delivery, FlushTrigger};
use crate::utils::error::{ConsumerError, Result};
use crate::utils::logging::LoggingUtils;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

const PAYLOAD_PREVIEW_LEN: usize = 64;

/// Outcome of a flush that reached the handler and was acknowledged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub batch_id: Uuid,
    pub trigger: FlushTrigger,
    pub size: usize,
    pub first_delivery_tag: u64,
    pub last_delivery_tag: u64,
    pub duration: Duration,
}

/// Owns the accumulator and runs every flush to completion
///
/// All methods take `&mut self`: whoever owns the dispatcher is the single
/// serialization point for batch mutation and flush initiation.
pub struct BatchDispatcher {
    accumulator: BatchAccumulator,
    pipeline: Arc<FilterPipeline>,
    connection: Arc<dyn BrokerConnection>,
    cancel: CancellationToken,
    stats: Arc<ConsumerStats>,
}

impl BatchDispatcher {
    pub fn new(
        accumulator: BatchAccumulator,
        pipeline: Arc<FilterPipeline>,
        connection: Arc<dyn BrokerConnection>,
        cancel: CancellationToken,
        stats: Arc<ConsumerStats>,
    ) -> Self {
        Self {
            accumulator,
            pipeline,
            connection,
            cancel,
            stats,
        }
    }

    /// Accept one delivery; flushes before returning when the batch is full
    pub async fn offer(&mut self, delivery: Delivery) -> Result<Option<FlushReport>> {
        self.stats.record_received();
        match self.accumulator.offer(delivery) {
            Some(batch) => self.dispatch(batch).await.map(Some),
            None => Ok(None),
        }
    }

    /// Flush the pending partial batch; a no-op when nothing is pending
    pub async fn flush(&mut self, trigger: FlushTrigger) -> Result<Option<FlushReport>> {
        match self.accumulator.take(trigger) {
            Some(batch) => self.dispatch(batch).await.map(Some),
            None => Ok(None),
        }
    }

    /// Drop the pending partial batch unacknowledged
    pub fn discard(&mut self) -> usize {
        let dropped = self.accumulator.discard();
        if dropped > 0 {
            self.stats.record_discarded(dropped as u64);
        }
        dropped
    }

    /// Deliveries waiting for the next flush
    #[inline]
    pub fn pending(&self) -> usize {
        self.accumulator.len()
    }

    /// How long the oldest pending delivery has been waiting
    pub fn pending_for(&self) -> Option<Duration> {
        self.accumulator.pending_for()
    }

    pub fn queue_name(&self) -> &str {
        self.accumulator.queue_name()
    }

    async fn dispatch(&self, batch: Batch) -> Result<FlushReport> {
        let started = Instant::now();
        self.stats.record_flush(batch.trigger());

        debug!(
            queue = batch.queue_name(),
            batch_id = %batch.id(),
            trigger = %batch.trigger(),
            size = batch.len(),
            "Flushing batch"
        );

        if let Err(e) = self.pipeline.handle(&batch, &self.cancel).await {
            self.stats.record_failed(batch.len() as u64);
            warn!(
                queue = batch.queue_name(),
                batch_id = %batch.id(),
                size = batch.len(),
                first_payload = %batch
                    .deliveries()
                    .first()
                    .map(|d| LoggingUtils::payload_preview(&d.body, PAYLOAD_PREVIEW_LEN))
                    .unwrap_or_default(),
                error = %e,
                "Batch handling failed, leaving deliveries unacknowledged"
            );
            return Err(ConsumerError::Handler(e));
        }

        self.acknowledge(&batch).await?;
        self.stats.record_handled();

        let report = FlushReport {
            batch_id: batch.id(),
            trigger: batch.trigger(),
            size: batch.len(),
            first_delivery_tag: batch.deliveries().first().map_or(0, |d| d.delivery_tag),
            last_delivery_tag: batch.last_delivery_tag().unwrap_or(0),
            duration: started.elapsed(),
        };

        debug!(
            queue = batch.queue_name(),
            batch_id = %report.batch_id,
            size = report.size,
            elapsed_ms = report.duration.as_millis() as u64,
            "Batch handled and acknowledged"
        );

        Ok(report)
    }

    /// Acknowledge each delivery individually, in receive order
    async fn acknowledge(&self, batch: &Batch) -> Result<()> {
        for delivery in batch {
            if let Err(e) = self.connection.acknowledge(delivery.delivery_tag, false).await {
                warn!(
                    queue = batch.queue_name(),
                    batch_id = %batch.id(),
                    delivery_tag = delivery.delivery_tag,
                    error = %e,
                    "Failed to acknowledge delivery"
                );
                return Err(e);
            }
            self.stats.record_acknowledged(1);
        }
        Ok(())
    }
}
