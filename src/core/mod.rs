//! Core functionality of the batch consumer
//!
//! This module contains the batching engine, its collaborator traits and the
//! data types that flow through it.

pub mod batch;
pub mod broker;
pub mod consumer;
pub mod filters;
pub mod pipeline;
pub mod traits;
pub mod types;
