//! Batch accumulation and flushing
//!
//! The accumulator decides batch boundaries; the dispatcher runs a flushed
//! batch through the filter pipeline and acknowledges it.

mod accumulator;
mod dispatcher;

// Re-export all public types
pub use accumulator::BatchAccumulator;
pub use dispatcher::{BatchDispatcher, FlushReport};
