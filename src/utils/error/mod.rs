//! Error handling utilities
//!
//! This module provides the error types shared by the consumer, its filters and handlers.

pub mod error;

// Re-export commonly used types
pub use error::*;
