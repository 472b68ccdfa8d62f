//! Consumer counters

use crate::core::types::FlushTrigger;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by the intake task
#[derive(Debug, Default)]
pub struct ConsumerStats {
    deliveries_received: AtomicU64,
    deliveries_acknowledged: AtomicU64,
    deliveries_discarded: AtomicU64,
    batches_handled: AtomicU64,
    batches_failed: AtomicU64,
    deliveries_failed: AtomicU64,
    count_flushes: AtomicU64,
    timer_flushes: AtomicU64,
    shutdown_flushes: AtomicU64,
}

/// Point-in-time copy of [`ConsumerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub deliveries_received: u64,
    pub deliveries_acknowledged: u64,
    pub deliveries_discarded: u64,
    pub batches_handled: u64,
    pub batches_failed: u64,
    pub deliveries_failed: u64,
    pub count_flushes: u64,
    pub timer_flushes: u64,
    pub shutdown_flushes: u64,
}

impl StatsSnapshot {
    /// Deliveries received but not yet acknowledged, failed or discarded
    pub fn outstanding(&self) -> u64 {
        self.deliveries_received.saturating_sub(
            self.deliveries_acknowledged + self.deliveries_failed + self.deliveries_discarded,
        )
    }
}

impl ConsumerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.deliveries_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_acknowledged(&self, count: u64) {
        self.deliveries_acknowledged
            .fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, count: u64) {
        self.deliveries_discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, trigger: FlushTrigger) {
        let counter = match trigger {
            FlushTrigger::Count => &self.count_flushes,
            FlushTrigger::Timer => &self.timer_flushes,
            FlushTrigger::Shutdown => &self.shutdown_flushes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handled(&self) {
        self.batches_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self, batch_size: u64) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.deliveries_failed
            .fetch_add(batch_size, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            deliveries_received: self.deliveries_received.load(Ordering::Relaxed),
            deliveries_acknowledged: self.deliveries_acknowledged.load(Ordering::Relaxed),
            deliveries_discarded: self.deliveries_discarded.load(Ordering::Relaxed),
            batches_handled: self.batches_handled.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
            count_flushes: self.count_flushes.load(Ordering::Relaxed),
            timer_flushes: self.timer_flushes.load(Ordering::Relaxed),
            shutdown_flushes: self.shutdown_flushes.load(Ordering::Relaxed),
        }
    }
}
