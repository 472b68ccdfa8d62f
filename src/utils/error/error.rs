//! Error handling for the batch consumer
//!
//! This module defines all error types used throughout the consumer.

use crate::core::types::HandlerState;
use thiserror::Error;

/// Result type alias for the consumer
pub type Result<T> = std::result::Result<T, ConsumerError>;

/// Result returned by batch handlers and filters
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Main error type for the consumer
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// Invalid consumer configuration (prefetch count, queue name, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The batch handler or one of the filters failed
    #[error("Batch handler failed: {0}")]
    Handler(#[from] HandlerError),

    /// Stop was cancelled while a drain flush was still outstanding
    #[error("Stop cancelled while draining queue '{queue}' ({pending} deliveries outstanding)")]
    CancelledDuringDrain { queue: String, pending: usize },

    /// The broker reported a connection or channel failure
    #[error("Connection fault: {0}")]
    ConnectionFault(String),

    /// Lifecycle operation not legal in the current state
    #[error("Cannot {operation} consumer while it is {state}")]
    InvalidState {
        operation: &'static str,
        state: HandlerState,
    },

    /// A lifecycle operation was cancelled before it completed
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsumerError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    pub fn connection_fault<S: Into<String>>(message: S) -> Self {
        Self::ConnectionFault(message.into())
    }

    pub fn cancelled<S: Into<String>>(message: S) -> Self {
        Self::Cancelled(message.into())
    }

    /// Soft conditions the caller may log and move on from.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::CancelledDuringDrain { .. })
    }

    /// Whether the broker connection behind the consumer is unusable.
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Self::ConnectionFault(_))
    }
}

/// Failure raised by a batch handler or a filter
///
/// A failed batch is never acknowledged; redelivery is left to the broker.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler could not process the batch
    #[error("{0}")]
    Failed(String),

    /// A filter refused the batch and converted the refusal into a failure
    #[error("rejected by filter '{filter}': {reason}")]
    Rejected { filter: String, reason: String },

    /// The handler observed its cancellation token and gave up
    #[error("batch handling cancelled")]
    Cancelled,

    /// Any other error bubbling out of user code
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self::Failed(message.into())
    }

    pub fn rejected<F: Into<String>, R: Into<String>>(filter: F, reason: R) -> Self {
        Self::Rejected {
            filter: filter.into(),
            reason: reason.into(),
        }
    }
}
