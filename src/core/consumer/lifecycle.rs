//! Consumer lifecycle: start, stop, disposal

use super::intake::{DrainOutcome, IntakeTask};
use super::stats::{ConsumerStats, StatsSnapshot};
use crate::config::models::BatchConsumerOptions;
use crate::config::validation::Validate;
use crate::core::batch::{BatchAccumulator, BatchDispatcher};
use crate::core::pipeline::FilterPipeline;
use crate::core::traits::{BatchFilter, BatchMessageHandler, BrokerConnection, ConnectionFactory};
use crate::core::types::HandlerState;
use crate::utils::error::{ConsumerError, HandlerError, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Batching consumer for one queue
///
/// Lifecycle operations are serialized; `state()` can be read at any time
/// without waiting for them. A running consumer whose broker connection fails
/// drops to `Stopped` on its own; the fault is returned by the next `stop`.
pub struct BatchConsumer {
    options: BatchConsumerOptions,
    factory: Arc<dyn ConnectionFactory>,
    pipeline: Arc<FilterPipeline>,
    state: Arc<RwLock<HandlerState>>,
    stats: Arc<ConsumerStats>,
    running: Mutex<Option<RunningConsumer>>,
}

/// Resources held between a successful start and the matching stop
struct RunningConsumer {
    connection: Arc<dyn BrokerConnection>,
    consumer_tag: String,
    shutdown: CancellationToken,
    handler_cancel: CancellationToken,
    task: JoinHandle<Result<DrainOutcome>>,
}

impl BatchConsumer {
    /// Create a consumer; filters are given in registration order
    pub fn new(
        options: BatchConsumerOptions,
        factory: Arc<dyn ConnectionFactory>,
        handler: Arc<dyn BatchMessageHandler>,
        filters: Vec<Arc<dyn BatchFilter>>,
    ) -> Self {
        Self {
            options,
            factory,
            pipeline: Arc::new(FilterPipeline::new(handler, filters)),
            state: Arc::new(RwLock::new(HandlerState::Stopped)),
            stats: Arc::new(ConsumerStats::new()),
            running: Mutex::new(None),
        }
    }

    pub fn builder(options: BatchConsumerOptions) -> BatchConsumerBuilder {
        BatchConsumerBuilder::new(options)
    }

    /// Current lifecycle state
    pub fn state(&self) -> HandlerState {
        *self.state.read()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn options(&self) -> &BatchConsumerOptions {
        &self.options
    }

    pub fn queue_name(&self) -> &str {
        &self.options.queue_name
    }

    pub fn pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    fn set_state(&self, state: HandlerState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        debug!(
            queue = %self.options.queue_name,
            from = %previous,
            to = %state,
            "Consumer state changed"
        );
    }

    /// Release what a run that ended on its own still holds
    async fn reap(&self, run: RunningConsumer) {
        run.shutdown.cancel();
        match run.task.await {
            Ok(Err(e)) => warn!(
                queue = %self.options.queue_name,
                consumer_tag = %run.consumer_tag,
                error = %e,
                "Discarding fault of previous run"
            ),
            Err(join_err) => warn!(
                queue = %self.options.queue_name,
                error = %join_err,
                "Previous intake task panicked"
            ),
            Ok(Ok(_)) => {}
        }
        close_quietly(run.connection.as_ref(), &self.options.queue_name).await;
    }

    /// Connect, register the broker consumer and start the intake task
    ///
    /// Fails with `InvalidState` unless the consumer is stopped. On any error
    /// the consumer is left stopped with nothing open.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<()> {
        let mut slot = self.running.lock().await;

        let state = self.state();
        if !state.can_start() {
            return Err(ConsumerError::InvalidState {
                operation: "start",
                state,
            });
        }

        Validate::validate(&self.options).map_err(ConsumerError::Configuration)?;

        if let Some(faulted) = slot.take() {
            self.reap(faulted).await;
        }

        self.set_state(HandlerState::Starting);
        match self.open(cancel).await {
            Ok(running) => {
                info!(
                    queue = %self.options.queue_name,
                    consumer_tag = %running.consumer_tag,
                    prefetch_count = self.options.prefetch_count,
                    "Batch consumer started"
                );
                *slot = Some(running);
                Ok(())
            }
            Err(e) => {
                warn!(queue = %self.options.queue_name, error = %e, "Failed to start batch consumer");
                self.set_state(HandlerState::Stopped);
                Err(e)
            }
        }
    }

    async fn open(&self, cancel: &CancellationToken) -> Result<RunningConsumer> {
        let options = &self.options;
        let accumulator = BatchAccumulator::new(options.queue_name.clone(), options.prefetch_count)?;

        let connection = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ConsumerError::cancelled("start cancelled while connecting"));
            }
            opened = self.factory.open_connection(&options.connection) => opened?,
        };

        let consumer_tag = format!("{}-{}", options.consumer_tag_prefix, Uuid::new_v4());
        let created = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(ConsumerError::cancelled("start cancelled while registering consumer"))
            }
            created = connection.create_consumer(
                &options.queue_name,
                options.prefetch_count,
                &consumer_tag,
            ) => created,
        };
        let deliveries = match created {
            Ok(deliveries) => deliveries,
            Err(e) => {
                close_quietly(connection.as_ref(), &options.queue_name).await;
                return Err(e);
            }
        };

        let shutdown = CancellationToken::new();
        let handler_cancel = CancellationToken::new();
        let dispatcher = BatchDispatcher::new(
            accumulator,
            self.pipeline.clone(),
            connection.clone(),
            handler_cancel.clone(),
            self.stats.clone(),
        );
        let intake = IntakeTask::new(
            dispatcher,
            deliveries,
            options.effective_handling_period(),
            options.drain_on_stop,
            shutdown.clone(),
        );

        // Running before the task exists, so a fault can only ever move it to Stopped.
        self.set_state(HandlerState::Running);
        let state = self.state.clone();
        let queue = options.queue_name.clone();
        let task = tokio::spawn(async move {
            let result = intake.run().await;
            if let Err(e) = &result {
                let mut current = state.write();
                if *current == HandlerState::Running {
                    *current = HandlerState::Stopped;
                    error!(queue = %queue, error = %e, "Intake failed, consumer stopped");
                }
            }
            result
        });

        Ok(RunningConsumer {
            connection,
            consumer_tag,
            shutdown,
            handler_cancel,
            task,
        })
    }

    /// Stop intake, drain or discard the pending batch and close the connection
    ///
    /// A no-op when already stopped. If `cancel` fires before the drain
    /// completes, the handler's token is cancelled and the wait is bounded by
    /// the drain timeout; the connection is released either way, and a drain
    /// that did not end in acknowledgments is reported as
    /// `CancelledDuringDrain`. A fault that ended intake while running is
    /// reported here.
    pub async fn stop(&self, cancel: &CancellationToken) -> Result<()> {
        let mut slot = self.running.lock().await;
        let Some(running) = slot.take() else {
            return Ok(());
        };

        self.set_state(HandlerState::Stopping);
        let RunningConsumer {
            connection,
            consumer_tag,
            shutdown,
            handler_cancel,
            mut task,
        } = running;

        shutdown.cancel();

        let (joined, drain_cancelled) = tokio::select! {
            biased;
            joined = &mut task => (Some(joined), false),
            _ = cancel.cancelled() => (None, true),
        };
        let joined = match joined {
            Some(joined) => Some(joined),
            None => {
                warn!(
                    queue = %self.options.queue_name,
                    drain_timeout_ms = self.options.drain_timeout.as_millis() as u64,
                    "Stop cancelled while draining, cancelling batch handler"
                );
                handler_cancel.cancel();
                tokio::time::timeout(self.options.drain_timeout, &mut task)
                    .await
                    .ok()
            }
        };

        let closed = connection.close().await;
        self.set_state(HandlerState::Stopped);

        let result = match joined {
            Some(Ok(Ok(outcome))) if drain_cancelled && outcome.abandoned > 0 => {
                if let Err(close_err) = closed {
                    debug!(queue = %self.options.queue_name, error = %close_err, "Close after cancelled drain failed");
                }
                Err(ConsumerError::CancelledDuringDrain {
                    queue: self.options.queue_name.clone(),
                    pending: outcome.abandoned,
                })
            }
            Some(Ok(Ok(outcome))) => {
                if outcome.abandoned > 0 {
                    warn!(
                        queue = %self.options.queue_name,
                        abandoned = outcome.abandoned,
                        "Shutdown drain failed, deliveries left for redelivery"
                    );
                }
                closed
            }
            Some(Ok(Err(e))) => {
                if let Err(close_err) = closed {
                    debug!(queue = %self.options.queue_name, error = %close_err, "Close after fault failed");
                }
                Err(e)
            }
            Some(Err(join_err)) => Err(ConsumerError::Handler(HandlerError::failed(format!(
                "intake task panicked: {}",
                join_err
            )))),
            // The task is left to finish on its own; acks against the closed
            // connection fail and end it.
            None => Err(ConsumerError::CancelledDuringDrain {
                queue: self.options.queue_name.clone(),
                pending: self.stats.snapshot().outstanding() as usize,
            }),
        };

        match &result {
            Ok(()) => info!(queue = %self.options.queue_name, consumer_tag = %consumer_tag, "Batch consumer stopped"),
            Err(e) if e.is_warning() => warn!(queue = %self.options.queue_name, error = %e, "Batch consumer stopped without finishing drain"),
            Err(e) => warn!(queue = %self.options.queue_name, error = %e, "Batch consumer stopped with error"),
        }

        result
    }

    /// Stop without a cancellation signal
    pub async fn dispose(&self) -> Result<()> {
        self.stop(&CancellationToken::new()).await
    }
}

impl Drop for BatchConsumer {
    fn drop(&mut self) {
        let Some(running) = self.running.get_mut().take() else {
            return;
        };

        debug!(queue = %self.options.queue_name, "Consumer dropped while running, stopping in background");
        running.shutdown.cancel();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let queue = self.options.queue_name.clone();
            handle.spawn(async move {
                if let Ok(Err(e)) = running.task.await {
                    warn!(queue = %queue, error = %e, "Intake of dropped consumer ended with error");
                }
                close_quietly(running.connection.as_ref(), &queue).await;
            });
        }
    }
}

impl std::fmt::Debug for BatchConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchConsumer")
            .field("queue_name", &self.options.queue_name)
            .field("state", &self.state())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

async fn close_quietly(connection: &dyn BrokerConnection, queue: &str) {
    if let Err(e) = connection.close().await {
        debug!(queue = %queue, error = %e, "Failed to close broker connection");
    }
}

/// Builder registering filters in order
pub struct BatchConsumerBuilder {
    options: BatchConsumerOptions,
    factory: Option<Arc<dyn ConnectionFactory>>,
    handler: Option<Arc<dyn BatchMessageHandler>>,
    filters: Vec<Arc<dyn BatchFilter>>,
}

impl BatchConsumerBuilder {
    pub fn new(options: BatchConsumerOptions) -> Self {
        Self {
            options,
            factory: None,
            handler: None,
            filters: Vec::new(),
        }
    }

    pub fn connection_factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn handler<H: BatchMessageHandler + 'static>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Register a filter; the last registered filter runs first
    pub fn filter<F: BatchFilter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn build(self) -> Result<BatchConsumer> {
        let factory = self.factory.ok_or_else(|| {
            ConsumerError::configuration(format!(
                "no connection factory configured for queue '{}'",
                self.options.queue_name
            ))
        })?;
        let handler = self.handler.ok_or_else(|| {
            ConsumerError::configuration(format!(
                "no batch handler configured for queue '{}'",
                self.options.queue_name
            ))
        })?;

        Ok(BatchConsumer::new(self.options, factory, handler, self.filters))
    }
}
