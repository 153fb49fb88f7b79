//! # Collaborator Interfaces
//!
//! The core never owns device identities, stored values or the wire. It
//! consumes them through these traits, so the gateway can run against a
//! message-bus bridge in production and against the in-memory versions in
//! [`memory`] for tests and the CLI.

pub mod memory;

pub use memory::{
    ChannelReporter, ChannelTransport, MemoryValueStore, OutboundFrame, Report,
    StaticIdentityRegistry,
};

use crate::error::WireSinkError;
use crate::frame::SensorId;
use crate::payload::TypedValue;
use std::collections::BTreeMap;

/// Resource name to value, as handed to the reporting callback.
pub type ValueMap = BTreeMap<String, TypedValue>;

/// Maps a sensor identity to its logical device name.
pub trait IdentityRegistry: Send + Sync {
    fn lookup_device(&self, identity: &SensorId) -> Option<String>;
}

/// Last-known resource values per logical device.
pub trait ValueStore: Send + Sync {
    fn write_value(&self, device: &str, resource: &str, value: TypedValue);

    fn read_value(&self, device: &str, resource: &str) -> Option<TypedValue>;

    /// Whether the store knows `device` at all.
    fn contains_device(&self, device: &str) -> bool;
}

/// Outbound hand-off of encoded frames.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, target: SensorId, bytes: Vec<u8>) -> Result<(), WireSinkError>;
}

/// Receives the values decoded from one frame or control response.
pub trait Reporter: Send + Sync {
    fn on_values_decoded(&self, device: &str, source_tag: &str, values: ValueMap);
}
