//! Delivery intake task
//!
//! One task per running consumer. It is the only code that touches the batch:
//! deliveries, timer ticks and the shutdown signal all arrive through a single
//! `select!`, and every flush runs to completion before the next event is
//! taken.

use crate::core::batch::BatchDispatcher;
use crate::core::traits::DeliveryStream;
use crate::core::types::FlushTrigger;
use crate::utils::error::{ConsumerError, Result};
use futures::StreamExt;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How the pending batch was settled once intake stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DrainOutcome {
    /// Deliveries flushed and acknowledged on shutdown
    pub(crate) flushed: usize,
    /// Deliveries the shutdown flush left unacknowledged
    pub(crate) abandoned: usize,
}

pub(crate) struct IntakeTask {
    dispatcher: BatchDispatcher,
    deliveries: DeliveryStream,
    handling_period: Option<Duration>,
    drain_on_stop: bool,
    shutdown: CancellationToken,
}

impl IntakeTask {
    pub(crate) fn new(
        dispatcher: BatchDispatcher,
        deliveries: DeliveryStream,
        handling_period: Option<Duration>,
        drain_on_stop: bool,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            dispatcher,
            deliveries,
            handling_period,
            drain_on_stop,
            shutdown,
        }
    }

    /// Pull deliveries until shutdown is signalled or the broker fails
    ///
    /// Returns `Err` only for faults that make the connection unusable; handler
    /// failures are logged and intake continues. A handler failure during the
    /// shutdown drain shows up as `abandoned` deliveries in the outcome.
    pub(crate) async fn run(self) -> Result<DrainOutcome> {
        let Self {
            mut dispatcher,
            mut deliveries,
            handling_period,
            drain_on_stop,
            shutdown,
        } = self;

        let mut timer = handling_period.map(flush_timer);

        info!(
            queue = dispatcher.queue_name(),
            handling_period_ms = handling_period.map(|p| p.as_millis() as u64),
            "Delivery intake started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => {
                        let outcome = dispatcher.offer(delivery).await;
                        keep_running(outcome)?;
                    }
                    Some(Err(e)) => {
                        error!(queue = dispatcher.queue_name(), error = %e, "Delivery stream failed");
                        discard_pending(&mut dispatcher);
                        return Err(e);
                    }
                    None => {
                        warn!(queue = dispatcher.queue_name(), "Delivery stream ended, consumer cancelled by broker");
                        discard_pending(&mut dispatcher);
                        return Err(ConsumerError::connection_fault(format!(
                            "consumer on queue '{}' was cancelled by the broker",
                            dispatcher.queue_name()
                        )));
                    }
                },

                _ = tick(&mut timer) => {
                    if let Some(waited) = dispatcher.pending_for() {
                        debug!(
                            queue = dispatcher.queue_name(),
                            pending = dispatcher.pending(),
                            oldest_pending_ms = waited.as_millis() as u64,
                            "Handling period elapsed"
                        );
                    }
                    let outcome = dispatcher.flush(FlushTrigger::Timer).await;
                    keep_running(outcome)?;
                }
            }
        }

        // The timer and the stream are dropped here; nothing else can grow the batch.
        drop(timer);
        drop(deliveries);

        let outcome = if drain_on_stop {
            drain(&mut dispatcher).await?
        } else {
            discard_pending(&mut dispatcher);
            DrainOutcome::default()
        };

        info!(
            queue = dispatcher.queue_name(),
            flushed = outcome.flushed,
            abandoned = outcome.abandoned,
            "Delivery intake stopped"
        );
        Ok(outcome)
    }
}

/// Flush the partial batch once with the `Shutdown` trigger
async fn drain(dispatcher: &mut BatchDispatcher) -> Result<DrainOutcome> {
    let pending = dispatcher.pending();
    debug!(
        queue = dispatcher.queue_name(),
        pending,
        oldest_pending_ms = dispatcher.pending_for().map(|d| d.as_millis() as u64),
        "Draining pending deliveries"
    );

    match dispatcher.flush(FlushTrigger::Shutdown).await {
        Ok(_) => Ok(DrainOutcome {
            flushed: pending,
            abandoned: 0,
        }),
        Err(ConsumerError::Handler(_)) => Ok(DrainOutcome {
            flushed: 0,
            abandoned: pending,
        }),
        Err(e) => Err(e),
    }
}

fn flush_timer(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Next timer tick, or never when no handling period is configured
async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Handler failures were already logged by the dispatcher and leave the
/// consumer running; everything else ends intake.
fn keep_running<T>(outcome: Result<T>) -> Result<()> {
    match outcome {
        Ok(_) | Err(ConsumerError::Handler(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

fn discard_pending(dispatcher: &mut BatchDispatcher) {
    let dropped = dispatcher.discard();
    if dropped > 0 {
        info!(
            queue = dispatcher.queue_name(),
            dropped, "Discarded pending deliveries without acknowledgment"
        );
    }
}
