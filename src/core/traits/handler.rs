//! User batch handler trait

use crate::core::types::Batch;
use crate::utils::error::HandlerResult;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Terminal step of the pipeline: the application's batch processing
///
/// `handle_messages` is only called with non-empty batches. Returning `Ok`
/// acknowledges every delivery in the batch; returning `Err` acknowledges none.
/// The token is cancelled when a stop gives up waiting for the consumer to
/// drain; handlers may observe it to finish early.
#[async_trait]
pub trait BatchMessageHandler: Send + Sync {
    async fn handle_messages(&self, batch: &Batch, cancel: &CancellationToken) -> HandlerResult;
}

#[async_trait]
impl<H> BatchMessageHandler for Arc<H>
where
    H: BatchMessageHandler + ?Sized,
{
    async fn handle_messages(&self, batch: &Batch, cancel: &CancellationToken) -> HandlerResult {
        (**self).handle_messages(batch, cancel).await
    }
}

/// Handler backed by an async closure
///
/// The closure receives its own copy of the batch so the returned future can be
/// `'static`; payloads are reference counted, so the copy is shallow.
pub struct FnHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

/// Build a handler from an async closure
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F, Fut>
where
    F: Fn(Batch, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    FnHandler {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> BatchMessageHandler for FnHandler<F, Fut>
where
    F: Fn(Batch, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle_messages(&self, batch: &Batch, cancel: &CancellationToken) -> HandlerResult {
        (self.f)(batch.clone(), cancel.clone()).await
    }
}
