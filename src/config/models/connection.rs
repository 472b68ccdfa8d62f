//! Broker connection configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options handed to the connection factory when a consumer starts
///
/// The consumer never interprets these itself; establishing the connection is
/// the [`ConnectionFactory`](crate::core::traits::ConnectionFactory)'s job.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionOptions {
    /// Broker host name
    #[serde(default = "default_host")]
    pub host: String,
    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,
    /// User name
    #[serde(default = "default_username")]
    pub username: String,
    /// Password
    #[serde(default = "default_password")]
    pub password: String,
    /// Virtual host
    #[serde(default = "default_virtual_host")]
    pub virtual_host: String,
    /// Client-provided connection name shown in the broker's management UI
    #[serde(default)]
    pub connection_name: Option<String>,
    /// Heartbeat interval in seconds
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u16,
    /// Connection establishment timeout (milliseconds on the wire)
    #[serde(
        default = "default_connection_timeout",
        rename = "connection_timeout_ms",
        with = "duration_millis"
    )]
    pub connection_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: default_password(),
            virtual_host: default_virtual_host(),
            connection_name: None,
            heartbeat_secs: default_heartbeat_secs(),
            connection_timeout: default_connection_timeout(),
        }
    }
}

impl std::fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("virtual_host", &self.virtual_host)
            .field("connection_name", &self.connection_name)
            .field("heartbeat_secs", &self.heartbeat_secs)
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}

impl ConnectionOptions {
    /// AMQP URI for these options, with the password masked
    pub fn display_uri(&self) -> String {
        let vhost = if self.virtual_host == "/" {
            "%2f".to_string()
        } else {
            self.virtual_host.trim_start_matches('/').to_string()
        };
        format!(
            "amqp://{}:***@{}:{}/{}",
            self.username, self.host, self.port, vhost
        )
    }

    /// Merge connection options (other takes precedence where it differs from defaults)
    pub fn merge(mut self, other: Self) -> Self {
        if other.host != default_host() {
            self.host = other.host;
        }
        if other.port != default_port() {
            self.port = other.port;
        }
        if other.username != default_username() {
            self.username = other.username;
        }
        if other.password != default_password() {
            self.password = other.password;
        }
        if other.virtual_host != default_virtual_host() {
            self.virtual_host = other.virtual_host;
        }
        if other.connection_name.is_some() {
            self.connection_name = other.connection_name;
        }
        if other.heartbeat_secs != default_heartbeat_secs() {
            self.heartbeat_secs = other.heartbeat_secs;
        }
        if other.connection_timeout != default_connection_timeout() {
            self.connection_timeout = other.connection_timeout;
        }
        self
    }
}
