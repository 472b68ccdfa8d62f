//! Broker implementations
//!
//! Real brokers plug in through [`ConnectionFactory`](crate::core::traits::ConnectionFactory);
//! the in-memory broker runs the consumer without any network.

mod memory;

pub use memory::{InMemoryBroker, InMemoryConnection};
