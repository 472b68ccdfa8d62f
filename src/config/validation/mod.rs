//! Configuration validation
//!
//! This module provides validation logic for all configuration structures.
//!
//! - `trait_def`: Core Validate trait definition
//! - `consumer_validators`: Consumer and connection validators
//! - `tests`: Test suite for all validators

mod consumer_validators;
mod trait_def;

pub use trait_def::Validate;
