//! Core data types
//!
//! Deliveries, batches and the consumer lifecycle state.

pub mod batch;
pub mod delivery;
pub mod state;

pub use batch::{Batch, FlushTrigger};
pub use delivery::{Delivery, DeliveryProperties};
pub use state::HandlerState;
