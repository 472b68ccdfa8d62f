//! Logging utilities
//!
//! Subscriber installation for binaries and tests embedding the consumer.

pub mod logger;

pub use logger::{LoggingUtils, init_logging};
