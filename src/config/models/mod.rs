//! Configuration data models
//!
//! This module defines all configuration structures used by the consumer.

pub mod connection;
pub mod consumer;
pub mod logging;

// Re-export all configuration types
pub use connection::*;
pub use consumer::*;
pub use logging::*;

/// Default broker host
pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Default AMQP port
pub fn default_port() -> u16 {
    5672
}

/// Default broker credentials
pub fn default_username() -> String {
    "guest".to_string()
}

pub fn default_password() -> String {
    "guest".to_string()
}

pub fn default_virtual_host() -> String {
    "/".to_string()
}

/// Default heartbeat interval in seconds
pub fn default_heartbeat_secs() -> u16 {
    60
}

/// Default connection timeout
pub fn default_connection_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(30)
}

/// Default prefetch count, also the batch size
pub fn default_prefetch_count() -> u16 {
    50
}

pub fn default_drain_on_stop() -> bool {
    true
}

/// Default bounded wait for a cancelled drain
pub fn default_drain_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(5)
}

pub fn default_consumer_tag_prefix() -> String {
    "batch-consumer".to_string()
}

/// Serialize a `Duration` as whole milliseconds
pub mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serialize an `Option<Duration>` as whole milliseconds (or null)
pub mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
