//! Closure-driven gatekeeping filter

use crate::core::pipeline::Next;
use crate::core::traits::BatchFilter;
use crate::core::types::Batch;
use crate::utils::error::{HandlerError, HandlerResult};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What a [`PredicateFilter`] does with a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    /// Hand the batch to the rest of the pipeline
    Continue,
    /// Stop here and report success; the batch is acknowledged unhandled
    Skip,
    /// Stop here and report failure; the batch is not acknowledged
    Reject(String),
}

/// Filter that decides from a synchronous closure whether a batch goes on
pub struct PredicateFilter<F> {
    name: String,
    predicate: F,
}

impl<F> PredicateFilter<F>
where
    F: Fn(&Batch) -> FilterDecision + Send + Sync,
{
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

#[async_trait]
impl<F> BatchFilter for PredicateFilter<F>
where
    F: Fn(&Batch) -> FilterDecision + Send + Sync,
{
    async fn handle(
        &self,
        batch: &Batch,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> HandlerResult {
        match (self.predicate)(batch) {
            FilterDecision::Continue => next.run(batch, cancel).await,
            FilterDecision::Skip => {
                debug!(filter = %self.name, batch_id = %batch.id(), size = batch.len(), "Batch skipped");
                Ok(())
            }
            FilterDecision::Reject(reason) => Err(HandlerError::rejected(self.name.clone(), reason)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> std::fmt::Debug for PredicateFilter<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateFilter")
            .field("name", &self.name)
            .finish()
    }
}
