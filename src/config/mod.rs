//! Configuration management for batch consumers
//!
//! This module handles loading, validation, and merging of consumer configuration.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::utils::error::{ConsumerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable prefix used by [`Config::from_env`]
pub const ENV_PREFIX: &str = "BATCH_CONSUMER";

/// Top-level configuration: logging plus one entry per consumed queue
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Consumer configurations
    #[serde(default)]
    pub consumers: Vec<BatchConsumerOptions>,
}

impl Config {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConsumerError::configuration(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_yaml(&content)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ConsumerError::configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a single-consumer configuration from environment variables
    ///
    /// Recognized variables (all prefixed with `BATCH_CONSUMER_`): `QUEUE`,
    /// `PREFETCH_COUNT`, `HANDLING_PERIOD_MS`, `DRAIN_ON_STOP`, `DRAIN_TIMEOUT_MS`,
    /// `HOST`, `PORT`, `USERNAME`, `PASSWORD`, `VHOST`, `LOG_LEVEL`.
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}_{}", ENV_PREFIX, name));
        let parse_err = |name: &str, value: &str| {
            ConsumerError::configuration(format!(
                "Invalid value for {}_{}: {}",
                ENV_PREFIX, name, value
            ))
        };

        let mut consumer = BatchConsumerOptions::default();
        if let Some(queue) = var("QUEUE") {
            consumer.queue_name = queue;
        }
        if let Some(value) = var("PREFETCH_COUNT") {
            consumer.prefetch_count = value
                .parse()
                .map_err(|_| parse_err("PREFETCH_COUNT", &value))?;
        }
        if let Some(value) = var("HANDLING_PERIOD_MS") {
            let millis: u64 = value
                .parse()
                .map_err(|_| parse_err("HANDLING_PERIOD_MS", &value))?;
            consumer.message_handling_period = Some(Duration::from_millis(millis));
        }
        if let Some(value) = var("DRAIN_ON_STOP") {
            consumer.drain_on_stop = matches!(value.to_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Some(value) = var("DRAIN_TIMEOUT_MS") {
            let millis: u64 = value
                .parse()
                .map_err(|_| parse_err("DRAIN_TIMEOUT_MS", &value))?;
            consumer.drain_timeout = Duration::from_millis(millis);
        }
        if let Some(host) = var("HOST") {
            consumer.connection.host = host;
        }
        if let Some(value) = var("PORT") {
            consumer.connection.port = value.parse().map_err(|_| parse_err("PORT", &value))?;
        }
        if let Some(username) = var("USERNAME") {
            consumer.connection.username = username;
        }
        if let Some(password) = var("PASSWORD") {
            consumer.connection.password = password;
        }
        if let Some(vhost) = var("VHOST") {
            consumer.connection.virtual_host = vhost;
        }

        let mut logging = LoggingConfig::default();
        if let Some(value) = var("LOG_LEVEL") {
            logging.level = value
                .parse()
                .map_err(|_| parse_err("LOG_LEVEL", &value))?;
        }

        let config = Self {
            logging,
            consumers: vec![consumer],
        };
        config.validate()?;
        Ok(config)
    }

    /// Get consumer configuration by queue name
    pub fn consumer(&self, queue_name: &str) -> Option<&BatchConsumerOptions> {
        self.consumers.iter().find(|c| c.queue_name == queue_name)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");
        Validate::validate(self).map_err(ConsumerError::Configuration)
    }

    /// Merge with another configuration (other takes precedence)
    ///
    /// Consumers are matched by queue name; unmatched ones are appended.
    pub fn merge(mut self, other: Self) -> Self {
        self.logging = self.logging.merge(other.logging);
        for consumer in other.consumers {
            match self
                .consumers
                .iter_mut()
                .find(|c| c.queue_name == consumer.queue_name)
            {
                Some(existing) => *existing = consumer,
                None => self.consumers.push(consumer),
            }
        }
        self
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
