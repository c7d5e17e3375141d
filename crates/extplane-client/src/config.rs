//! Client configuration

use std::time::Duration;

use extplane_protocol::UpdateInterval;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// TCP port the ExtPlane plugin listens on by default
pub const DEFAULT_PORT: u16 = 51000;

/// Connection and subscription settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Host running X-Plane with the ExtPlane plugin
    pub host: String,
    /// ExtPlane TCP port
    pub port: u16,
    /// Update interval sent with `extplane-set` on every connect
    pub update_interval: Option<UpdateInterval>,
    /// Age after which an unacknowledged subscription is reported as stalled (ms)
    pub stall_threshold_ms: u64,
    /// Delay between reconnection attempts (ms)
    pub reconnect_delay_ms: u64,
    /// Capacity of the command and event channels
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            update_interval: None,
            stall_threshold_ms: 5000,
            reconnect_delay_ms: 2000,
            channel_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// `host:port` for connecting
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_millis(self.stall_threshold_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Capacity for the command and event channels, at least 1
    pub fn channel_bound(&self) -> usize {
        self.channel_capacity.max(1)
    }

    /// Reject values the client cannot run with
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.channel_capacity == 0 {
            return Err(ClientError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.host.is_empty() {
            return Err(ClientError::Config("host must not be empty".to_string()));
        }
        Ok(())
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ClientError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ClientError> {
        serde_json::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))
    }
}
