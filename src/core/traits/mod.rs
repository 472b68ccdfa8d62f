//! Core traits module
//!
//! Seams between the consumer engine, the broker collaborator and user code.

pub mod broker;
pub mod filter;
pub mod handler;

pub use broker::*;
pub use filter::*;
pub use handler::*;
