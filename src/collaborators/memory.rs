//! In-memory collaborators backed by `Mutex`-guarded maps and tokio channels.

use super::{IdentityRegistry, Reporter, Transport, ValueMap, ValueStore};
use crate::config::DeviceMapping;
use crate::error::WireSinkError;
use crate::frame::SensorId;
use crate::payload::TypedValue;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Identity registry with add/update/remove of mappings.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityRegistry {
    inner: Arc<Mutex<HashMap<SensorId, String>>>,
}

impl StaticIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from configured mappings.
    pub fn from_mappings(mappings: &[DeviceMapping]) -> Result<Self, WireSinkError> {
        let registry = Self::new();
        for mapping in mappings {
            registry.add(mapping.sensor_id()?, &mapping.name);
        }
        Ok(registry)
    }

    /// Adds or replaces the mapping for `identity`.
    pub fn add(&self, identity: SensorId, device: &str) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = map.insert(identity, device.to_string()) {
            debug!("Identity {} remapped from {} to {}", identity, old, device);
        }
    }

    /// Moves a device to a new identity, dropping its old mapping.
    pub fn update(&self, device: &str, identity: SensorId) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.retain(|_, name| name != device);
        map.insert(identity, device.to_string());
    }

    /// Removes every mapping pointing at `device`. Returns whether any existed.
    pub fn remove_device(&self, device: &str) -> bool {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = map.len();
        map.retain(|_, name| name != device);
        map.len() != before
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityRegistry for StaticIdentityRegistry {
    fn lookup_device(&self, identity: &SensorId) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }
}

/// Per-device resource maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryValueStore {
    inner: Arc<Mutex<HashMap<String, ValueMap>>>,
}

impl MemoryValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every value stored for `device`.
    pub fn values(&self, device: &str) -> Option<ValueMap> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device)
            .cloned()
    }

    pub fn remove_device(&self, device: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(device)
            .is_some()
    }
}

impl ValueStore for MemoryValueStore {
    fn write_value(&self, device: &str, resource: &str, value: TypedValue) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(device.to_string())
            .or_default()
            .insert(resource.to_string(), value);
    }

    fn read_value(&self, device: &str, resource: &str) -> Option<TypedValue> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device)
            .and_then(|values| values.get(resource))
            .cloned()
    }

    fn contains_device(&self, device: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(device)
    }
}

/// A frame handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub target: SensorId,
    pub bytes: Vec<u8>,
}

/// Transport that forwards every outbound frame into a channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: UnboundedSender<OutboundFrame>,
}

impl ChannelTransport {
    pub fn new() -> (Self, UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = unbounded_channel();
        (ChannelTransport { tx }, rx)
    }
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, target: SensorId, bytes: Vec<u8>) -> Result<(), WireSinkError> {
        self.tx
            .send(OutboundFrame { target, bytes })
            .map_err(|_| WireSinkError::Transport("outbound receiver dropped".into()))
    }
}

/// One reporting callback invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub device: String,
    pub source_tag: String,
    pub values: ValueMap,
}

/// Reporter that forwards every callback into a channel.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: UnboundedSender<Report>,
}

impl ChannelReporter {
    pub fn new() -> (Self, UnboundedReceiver<Report>) {
        let (tx, rx) = unbounded_channel();
        (ChannelReporter { tx }, rx)
    }
}

impl Reporter for ChannelReporter {
    fn on_values_decoded(&self, device: &str, source_tag: &str, values: ValueMap) {
        let report = Report {
            device: device.to_string(),
            source_tag: source_tag.to_string(),
            values,
        };
        if self.tx.send(report).is_err() {
            debug!("Report for {} dropped, receiver closed", device);
        }
    }
}
