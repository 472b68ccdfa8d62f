//! Filter pipeline
//!
//! Composes the registered [`BatchFilter`]s around the terminal
//! [`BatchMessageHandler`]. The last registered filter is the outermost layer
//! and runs first; the first registered filter runs last, right before the
//! handler.


use crate::core::traits::{BatchFilter, BatchMessageHandler};
use crate::core::types::Batch;
use crate::utils::error::HandlerResult;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Composed batch handling function
///
/// Composition is fixed at construction and never changes afterwards.
pub struct FilterPipeline {
    /// Filters in execution order, outermost first
    layers: Vec<Arc<dyn BatchFilter>>,
    handler: Arc<dyn BatchMessageHandler>,
}

impl FilterPipeline {
    /// Build a pipeline from filters in registration order
    pub fn new(handler: Arc<dyn BatchMessageHandler>, filters: Vec<Arc<dyn BatchFilter>>) -> Self {
        let layers: Vec<Arc<dyn BatchFilter>> = filters.into_iter().rev().collect();

        debug!(
            filters = layers.len(),
            "Built batch pipeline: {:?}",
            layers.iter().map(|l| l.name()).collect::<Vec<_>>()
        );

        Self { layers, handler }
    }

    /// Pipeline that only calls the handler
    pub fn handler_only(handler: Arc<dyn BatchMessageHandler>) -> Self {
        Self::new(handler, Vec::new())
    }

    /// Run a batch through every filter and the handler
    pub async fn handle(&self, batch: &Batch, cancel: &CancellationToken) -> HandlerResult {
        Next::new(&self.layers, self.handler.as_ref())
            .run(batch, cancel)
            .await
    }

    /// Filter names in execution order
    pub fn filter_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterPipeline")
            .field("filters", &self.filter_names())
            .finish()
    }
}

/// The rest of the pipeline, as seen from inside a filter
pub struct Next<'a> {
    layers: &'a [Arc<dyn BatchFilter>],
    handler: &'a dyn BatchMessageHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        layers: &'a [Arc<dyn BatchFilter>],
        handler: &'a dyn BatchMessageHandler,
    ) -> Self {
        Self { layers, handler }
    }

    /// Invoke the inner filters and, finally, the handler
    pub async fn run(self, batch: &Batch, cancel: &CancellationToken) -> HandlerResult {
        match self.layers.split_first() {
            Some((layer, inner)) => {
                layer
                    .handle(batch, cancel, Next::new(inner, self.handler))
                    .await
            }
            None => self.handler.handle_messages(batch, cancel).await,
        }
    }
}
