//! Inbound control response dispatch.
//!
//! The control byte selects a [`ControlHandler`] by (control type,
//! request/set flag). Keys with no handler are logged and dropped.

use super::encoder::reset_request;
use super::{ControlKey, ControlType};
use crate::collaborators::{IdentityRegistry, ValueMap, ValueStore};
use crate::constants::{RESOURCE_RESET_STATUS, RESOURCE_SENSOR_ID, RESOURCE_TIMESTAMP};
use crate::error::WireSinkError;
use crate::frame::{Frame, SensorId};
use crate::payload::{decode_parameters, TypedValue};
use log::{debug, info, warn};
use std::sync::Arc;

/// Handler kinds for inbound control responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlHandler {
    /// Parameter list response: decoded like a business frame.
    CommonParameters,
    /// Little-endian epoch seconds.
    Timestamp,
    /// One status byte.
    ResetAck,
    /// Sensor asks to be reset; answered with a reset request.
    ResetTrigger,
}

impl ControlHandler {
    pub fn for_key(key: ControlKey) -> Option<Self> {
        match (ControlType::from_code(key.control_type)?, key.set) {
            (ControlType::GeneralParameters, _)
            | (ControlType::MonitoringData, _)
            | (ControlType::AlarmParameters, _) => Some(ControlHandler::CommonParameters),
            (ControlType::Time, _) => Some(ControlHandler::Timestamp),
            (ControlType::Reset, _) => Some(ControlHandler::ResetAck),
            (ControlType::ResetTrigger, false) => Some(ControlHandler::ResetTrigger),
            (ControlType::ResetTrigger, true) | (ControlType::SensorIdentity, _) => None,
        }
    }
}

/// What a dispatched response produced.
#[derive(Debug, Default, PartialEq)]
pub struct DispatchOutcome {
    /// Values to hand to the reporting callback, for parameter responses.
    pub reported: Option<ValueMap>,
    /// Frames to send, addressed by target identity.
    pub outbound: Vec<(SensorId, Vec<u8>)>,
}

/// Routes control responses to their handlers and records the results.
#[derive(Clone)]
pub struct ControlDispatcher {
    identities: Arc<dyn IdentityRegistry>,
    store: Arc<dyn ValueStore>,
}

impl ControlDispatcher {
    pub fn new(identities: Arc<dyn IdentityRegistry>, store: Arc<dyn ValueStore>) -> Self {
        ControlDispatcher { identities, store }
    }

    /// Dispatches one control response.
    ///
    /// # Arguments
    ///
    /// * `control_byte` - control type in bits 7..1, request/set flag in bit 0
    /// * `payload` - the response body after the control byte
    /// * `frame` - the enclosing frame
    ///
    /// # Returns
    ///
    /// An empty outcome for unmapped keys; an error when the sensor is unknown
    /// or the handler cannot use the body.
    pub fn dispatch(
        &self,
        control_byte: u8,
        payload: &[u8],
        frame: &Frame,
    ) -> Result<DispatchOutcome, WireSinkError> {
        let key = ControlKey::from_byte(control_byte);
        let Some(handler) = ControlHandler::for_key(key) else {
            warn!(
                "No control handler for type {} flag {} from {}",
                key.control_type,
                u8::from(key.set),
                frame.identity
            );
            return Ok(DispatchOutcome::default());
        };

        let device = self
            .identities
            .lookup_device(&frame.identity)
            .ok_or(WireSinkError::UnknownSensorIdentity(frame.identity))?;
        debug!("Dispatching {:?} for {} ({})", handler, device, frame.identity);

        match handler {
            ControlHandler::CommonParameters => {
                Ok(self.common_parameters(&device, payload, frame.param_count))
            }
            ControlHandler::Timestamp => self.timestamp(&device, payload),
            ControlHandler::ResetAck => self.reset_ack(&device, payload),
            ControlHandler::ResetTrigger => self.reset_trigger(&device),
        }
    }

    fn common_parameters(&self, device: &str, payload: &[u8], count: u8) -> DispatchOutcome {
        let list = decode_parameters(payload, usize::from(count));
        let mut reported = ValueMap::new();
        for param in list.values {
            self.store.write_value(device, param.name, param.value.clone());
            reported.insert(param.name.to_string(), param.value);
        }
        DispatchOutcome {
            reported: Some(reported),
            outbound: Vec::new(),
        }
    }

    fn timestamp(&self, device: &str, payload: &[u8]) -> Result<DispatchOutcome, WireSinkError> {
        let bytes: [u8; 4] = payload
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or(WireSinkError::ControlPayloadTooShort {
                needed: 4,
                actual: payload.len(),
            })?;
        let secs = u32::from_le_bytes(bytes);
        match chrono::DateTime::from_timestamp(i64::from(secs), 0) {
            Some(time) => info!("{} reports time {} ({})", device, time.format("%Y-%m-%d %H:%M:%S"), secs),
            None => info!("{} reports time {}", device, secs),
        }
        self.store
            .write_value(device, RESOURCE_TIMESTAMP, TypedValue::U32(secs));
        Ok(DispatchOutcome::default())
    }

    fn reset_ack(&self, device: &str, payload: &[u8]) -> Result<DispatchOutcome, WireSinkError> {
        let status = *payload
            .first()
            .ok_or(WireSinkError::ControlPayloadTooShort {
                needed: 1,
                actual: 0,
            })?;
        info!("{} acknowledged reset with status 0x{:02X}", device, status);
        self.store
            .write_value(device, RESOURCE_RESET_STATUS, TypedValue::U8(status));
        Ok(DispatchOutcome::default())
    }

    fn reset_trigger(&self, device: &str) -> Result<DispatchOutcome, WireSinkError> {
        let target = stored_identity(self.store.as_ref(), device)?;
        info!("{} requested a reset, sending reset request to {}", device, target);
        Ok(DispatchOutcome {
            reported: None,
            outbound: vec![(target, reset_request(target))],
        })
    }
}

/// Reads the device's stored sensor identity (resource `eid`).
pub(crate) fn stored_identity(
    store: &dyn ValueStore,
    device: &str,
) -> Result<SensorId, WireSinkError> {
    store
        .read_value(device, RESOURCE_SENSOR_ID)
        .as_ref()
        .and_then(TypedValue::as_text)
        .and_then(|hex| hex.parse().ok())
        .ok_or_else(|| WireSinkError::MissingSensorIdentity(device.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MemoryValueStore, StaticIdentityRegistry};
    use crate::frame::{FrameHeader, PacketType};
    use crate::payload::ParameterEntry;

    const ID: SensorId = SensorId::new([0x23, 0x8A, 0x08, 0x41, 0xD8, 0x28]);

    fn setup() -> (ControlDispatcher, MemoryValueStore) {
        let registry = StaticIdentityRegistry::new();
        registry.add(ID, "breaker-1");
        let store = MemoryValueStore::new();
        let dispatcher = ControlDispatcher::new(Arc::new(registry), Arc::new(store.clone()));
        (dispatcher, store)
    }

    fn response(param_count: u8, payload: Vec<u8>) -> Frame {
        Frame::new(
            ID,
            FrameHeader::new(param_count, false, PacketType::ControlResponse),
            payload,
        )
    }

    #[test]
    fn test_handler_table() {
        let key = |control_type, set| ControlKey { control_type, set };
        assert_eq!(ControlHandler::for_key(key(1, true)), Some(ControlHandler::CommonParameters));
        assert_eq!(ControlHandler::for_key(key(2, false)), Some(ControlHandler::CommonParameters));
        assert_eq!(ControlHandler::for_key(key(3, true)), Some(ControlHandler::CommonParameters));
        assert_eq!(ControlHandler::for_key(key(4, false)), Some(ControlHandler::Timestamp));
        assert_eq!(ControlHandler::for_key(key(6, true)), Some(ControlHandler::ResetAck));
        assert_eq!(ControlHandler::for_key(key(7, false)), Some(ControlHandler::ResetTrigger));
        assert_eq!(ControlHandler::for_key(key(7, true)), None);
        assert_eq!(ControlHandler::for_key(key(5, false)), None);
        assert_eq!(ControlHandler::for_key(key(0x50, false)), None);
    }

    #[test]
    fn test_common_parameters_written_and_reported() {
        let (dispatcher, store) = setup();
        let body = ParameterEntry::named("DataCollectionInterval", 60u16.to_le_bytes().to_vec())
            .unwrap()
            .to_bytes();
        let frame = response(1, body.clone());

        let outcome = dispatcher.dispatch(0x03, &body, &frame).unwrap();
        let reported = outcome.reported.unwrap();
        assert_eq!(reported.get("DataCollectionInterval"), Some(&TypedValue::U16(60)));
        assert_eq!(
            store.read_value("breaker-1", "DataCollectionInterval"),
            Some(TypedValue::U16(60))
        );
        assert!(outcome.outbound.is_empty());
    }

    #[test]
    fn test_timestamp_response() {
        let (dispatcher, store) = setup();
        let body = 1_750_852_800u32.to_le_bytes();
        let outcome = dispatcher.dispatch(0x08, &body, &response(0, body.to_vec())).unwrap();
        assert_eq!(outcome, DispatchOutcome::default());
        assert_eq!(
            store.read_value("breaker-1", RESOURCE_TIMESTAMP),
            Some(TypedValue::U32(1_750_852_800))
        );

        assert!(matches!(
            dispatcher.dispatch(0x08, &[1, 2], &response(0, vec![])),
            Err(WireSinkError::ControlPayloadTooShort { needed: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_reset_ack_records_status() {
        let (dispatcher, store) = setup();
        dispatcher.dispatch(0x0D, &[0xFF], &response(0, vec![])).unwrap();
        assert_eq!(
            store.read_value("breaker-1", RESOURCE_RESET_STATUS),
            Some(TypedValue::U8(0xFF))
        );
    }

    #[test]
    fn test_reset_trigger_emits_reset_request() {
        let (dispatcher, store) = setup();
        store.write_value("breaker-1", RESOURCE_SENSOR_ID, "238A0841D828".into());

        let outcome = dispatcher.dispatch(0x0E, &[], &response(0, vec![])).unwrap();
        assert_eq!(outcome.outbound, vec![(ID, reset_request(ID))]);
    }

    #[test]
    fn test_reset_trigger_without_identity() {
        let (dispatcher, _) = setup();
        assert!(matches!(
            dispatcher.dispatch(0x0E, &[], &response(0, vec![])),
            Err(WireSinkError::MissingSensorIdentity(_))
        ));
    }

    #[test]
    fn test_unmapped_key_is_dropped() {
        let (dispatcher, store) = setup();
        let outcome = dispatcher.dispatch(0x0A, &[0; 6], &response(0, vec![])).unwrap();
        assert_eq!(outcome, DispatchOutcome::default());
        assert!(!store.contains_device("breaker-1"));
    }

    #[test]
    fn test_unknown_sensor() {
        let (dispatcher, _) = setup();
        let frame = Frame::new(
            SensorId::new([0; 6]),
            FrameHeader::new(0, false, PacketType::ControlResponse),
            vec![],
        );
        assert!(matches!(
            dispatcher.dispatch(0x0D, &[0], &frame),
            Err(WireSinkError::UnknownSensorIdentity(_))
        ));
    }
}
