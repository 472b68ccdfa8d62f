//! Batch timing and outcome logging

use crate::core::pipeline::Next;
use crate::core::traits::BatchFilter;
use crate::core::types::Batch;
use crate::utils::error::HandlerResult;
use crate::utils::logging::LoggingUtils;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Logs every batch passing through, with its duration and outcome
///
/// Batches slower than the configured threshold are logged at `warn`.
#[derive(Debug, Clone)]
pub struct TracingFilter {
    slow_threshold: Option<Duration>,
}

impl TracingFilter {
    pub fn new() -> Self {
        Self {
            slow_threshold: None,
        }
    }

    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    fn is_slow(&self, elapsed: Duration) -> bool {
        self.slow_threshold.is_some_and(|t| elapsed >= t)
    }
}

impl Default for TracingFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchFilter for TracingFilter {
    async fn handle(
        &self,
        batch: &Batch,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> HandlerResult {
        let started = Instant::now();
        debug!(
            queue = batch.queue_name(),
            batch_id = %batch.id(),
            trigger = %batch.trigger(),
            size = batch.len(),
            payload_bytes = batch.payload_bytes(),
            "Batch handling started"
        );

        let result = next.run(batch, cancel).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(()) if self.is_slow(elapsed) => warn!(
                queue = batch.queue_name(),
                batch_id = %batch.id(),
                size = batch.len(),
                elapsed = %LoggingUtils::format_duration(elapsed),
                "Slow batch handled"
            ),
            Ok(()) => info!(
                queue = batch.queue_name(),
                batch_id = %batch.id(),
                size = batch.len(),
                elapsed = %LoggingUtils::format_duration(elapsed),
                "Batch handled"
            ),
            Err(e) => warn!(
                queue = batch.queue_name(),
                batch_id = %batch.id(),
                size = batch.len(),
                elapsed = %LoggingUtils::format_duration(elapsed),
                error = %e,
                "Batch handling failed"
            ),
        }

        result
    }

    fn name(&self) -> &str {
        "tracing"
    }
}
