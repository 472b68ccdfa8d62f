//! Batch handling filter trait

use crate::core::pipeline::Next;
use crate::core::types::Batch;
use crate::utils::error::HandlerResult;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Cross-cutting wrapper around batch handling
///
/// A filter may run logic before and after calling `next.run(..)`, skip the
/// call entirely (nothing further down the pipeline runs), or inspect and
/// convert the inner result.
#[async_trait]
pub trait BatchFilter: Send + Sync {
    async fn handle(
        &self,
        batch: &Batch,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> HandlerResult;

    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
