//! Consumer configuration validators
//!
//! Validation for BatchConsumerOptions, ConnectionOptions and the top-level Config.

use super::trait_def::Validate;
use crate::config::Config;
use crate::config::models::*;
use std::collections::HashSet;

impl Validate for BatchConsumerOptions {
    fn validate(&self) -> Result<(), String> {
        if self.queue_name.trim().is_empty() {
            return Err("queue_name cannot be empty".to_string());
        }

        if self.prefetch_count == 0 {
            return Err(format!(
                "prefetch_count for queue '{}' must be at least 1",
                self.queue_name
            ));
        }

        if self.drain_timeout.is_zero() {
            return Err(format!(
                "drain_timeout for queue '{}' must be greater than 0",
                self.queue_name
            ));
        }

        if self.consumer_tag_prefix.is_empty() {
            return Err("consumer_tag_prefix cannot be empty".to_string());
        }

        self.connection
            .validate()
            .map_err(|e| format!("connection for queue '{}': {}", self.queue_name, e))
    }
}

impl Validate for ConnectionOptions {
    fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host cannot be empty".to_string());
        }

        if self.port == 0 {
            return Err("port cannot be 0".to_string());
        }

        if self.virtual_host.is_empty() {
            return Err("virtual_host cannot be empty".to_string());
        }

        if self.connection_timeout.is_zero() {
            return Err("connection_timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), String> {
        let mut queue_names = HashSet::new();
        for consumer in &self.consumers {
            Validate::validate(consumer)?;
            if !queue_names.insert(consumer.queue_name.as_str()) {
                return Err(format!(
                    "Duplicate consumer for queue: {}",
                    consumer.queue_name
                ));
            }
        }
        Ok(())
    }
}
