//! Utility modules for the batch consumer
//!
//! - **error**: Error types and the crate `Result` alias
//! - **logging**: tracing subscriber setup and log formatting helpers

pub mod error;
pub mod logging;

pub use error::{ConsumerError, HandlerError, HandlerResult, Result};
pub use logging::{LoggingUtils, init_logging};
