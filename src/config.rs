//! # Gateway Configuration
//!
//! Runtime settings for [`crate::gateway::Gateway`], loaded from JSON. Every
//! field has a default, so `{}` is a valid configuration.
//!
//! ```json
//! {
//!   "reassembly_timeout_secs": 20,
//!   "inbound_queue_depth": 128,
//!   "shard_queue_depth": 100,
//!   "source_tag": "AsyncReporting",
//!   "devices": [
//!     { "sensor_id": "238A08262319", "name": "transformer-oil-1" }
//!   ]
//! }
//! ```

use crate::constants::{DEFAULT_REASSEMBLY_TIMEOUT_SECS, DEFAULT_SOURCE_TAG};
use crate::error::WireSinkError;
use crate::frame::SensorId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Sensor identity to logical device name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMapping {
    /// 12 hex characters.
    pub sensor_id: String,
    pub name: String,
}

impl DeviceMapping {
    pub fn sensor_id(&self) -> Result<SensorId, WireSinkError> {
        self.sensor_id.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Seconds without progress before a reassembly is evicted.
    pub reassembly_timeout_secs: u64,
    /// Capacity of the raw frame intake queue.
    pub inbound_queue_depth: usize,
    /// Capacity of the queue between frame intake and shard reassembly.
    pub shard_queue_depth: usize,
    /// Source tag handed to the reporting callback.
    pub source_tag: String,
    /// Seeds the in-memory identity registry.
    pub devices: Vec<DeviceMapping>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            reassembly_timeout_secs: DEFAULT_REASSEMBLY_TIMEOUT_SECS,
            inbound_queue_depth: 128,
            shard_queue_depth: 100,
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            devices: Vec::new(),
        }
    }
}

impl GatewayConfig {
    pub fn from_json_str(json: &str) -> Result<Self, WireSinkError> {
        let config: GatewayConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, WireSinkError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), WireSinkError> {
        if self.reassembly_timeout_secs == 0 {
            return Err(WireSinkError::Config(
                "reassembly_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.inbound_queue_depth == 0 || self.shard_queue_depth == 0 {
            return Err(WireSinkError::Config(
                "queue depths must be greater than zero".into(),
            ));
        }
        for device in &self.devices {
            device.sensor_id().map_err(|e| {
                WireSinkError::Config(format!("device {:?}: {}", device.name, e))
            })?;
        }
        Ok(())
    }

    pub fn reassembly_timeout(&self) -> Duration {
        Duration::from_secs(self.reassembly_timeout_secs)
    }
}
