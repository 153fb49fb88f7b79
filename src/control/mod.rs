//! # Control Messages
//!
//! Control frames carry a control byte right after the header:
//!
//! ```text
//! identity(6) | header | controlType(7) requestSetFlag(1) | body | checksum
//! ```
//!
//! [`encoder`] builds outbound requests, [`dispatch`] routes inbound
//! responses to their handlers, and [`ControlMessage`] is the parsed view both
//! share.

pub mod dispatch;
pub mod encoder;

pub use dispatch::{ControlDispatcher, ControlHandler, DispatchOutcome};
pub use encoder::{
    alarm_parameters_query, general_parameters_request, monitoring_data_query, reset_request,
    sensor_id_request, time_request, ControlRequest,
};

use crate::constants::{
    CONTROL_TYPE_ALARM_PARAMETERS, CONTROL_TYPE_GENERAL_PARAMETERS, CONTROL_TYPE_MONITORING_DATA,
    CONTROL_TYPE_RESET, CONTROL_TYPE_RESET_TRIGGER, CONTROL_TYPE_SENSOR_ID, CONTROL_TYPE_TIME,
};
use crate::error::WireSinkError;
use crate::frame::{Frame, PacketType, SensorId};

/// Known 7-bit control types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlType {
    GeneralParameters,
    MonitoringData,
    AlarmParameters,
    Time,
    SensorIdentity,
    Reset,
    ResetTrigger,
}

impl ControlType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            CONTROL_TYPE_GENERAL_PARAMETERS => Some(ControlType::GeneralParameters),
            CONTROL_TYPE_MONITORING_DATA => Some(ControlType::MonitoringData),
            CONTROL_TYPE_ALARM_PARAMETERS => Some(ControlType::AlarmParameters),
            CONTROL_TYPE_TIME => Some(ControlType::Time),
            CONTROL_TYPE_SENSOR_ID => Some(ControlType::SensorIdentity),
            CONTROL_TYPE_RESET => Some(ControlType::Reset),
            CONTROL_TYPE_RESET_TRIGGER => Some(ControlType::ResetTrigger),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ControlType::GeneralParameters => CONTROL_TYPE_GENERAL_PARAMETERS,
            ControlType::MonitoringData => CONTROL_TYPE_MONITORING_DATA,
            ControlType::AlarmParameters => CONTROL_TYPE_ALARM_PARAMETERS,
            ControlType::Time => CONTROL_TYPE_TIME,
            ControlType::SensorIdentity => CONTROL_TYPE_SENSOR_ID,
            ControlType::Reset => CONTROL_TYPE_RESET,
            ControlType::ResetTrigger => CONTROL_TYPE_RESET_TRIGGER,
        }
    }
}

/// Handler lookup key: (control type, request/set flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlKey {
    pub control_type: u8,
    pub set: bool,
}

impl ControlKey {
    pub fn from_byte(control_byte: u8) -> Self {
        ControlKey {
            control_type: control_byte >> 1,
            set: control_byte & 0x01 == 1,
        }
    }

    pub fn to_byte(self) -> u8 {
        ((self.control_type & 0x7F) << 1) | u8::from(self.set)
    }
}

/// A control frame split into its control fields and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    pub identity: SensorId,
    pub param_count: u8,
    pub packet_type: PacketType,
    pub control_type: u8,
    pub request_set_flag: u8,
    pub body: Vec<u8>,
}

impl ControlMessage {
    /// Parses the control byte and body out of a decoded frame.
    pub fn from_frame(frame: &Frame) -> Result<Self, WireSinkError> {
        let (&control_byte, body) =
            frame
                .payload
                .split_first()
                .ok_or(WireSinkError::ControlPayloadTooShort {
                    needed: 1,
                    actual: 0,
                })?;
        let key = ControlKey::from_byte(control_byte);
        Ok(ControlMessage {
            identity: frame.identity,
            param_count: frame.param_count,
            packet_type: frame.packet_type,
            control_type: key.control_type,
            request_set_flag: u8::from(key.set),
            body: body.to_vec(),
        })
    }

    pub fn key(&self) -> ControlKey {
        ControlKey {
            control_type: self.control_type,
            set: self.request_set_flag == 1,
        }
    }

    pub fn control_byte(&self) -> u8 {
        self.key().to_byte()
    }

    pub fn kind(&self) -> Option<ControlType> {
        ControlType::from_code(self.control_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameHeader;

    #[test]
    fn test_control_key_bits() {
        let key = ControlKey::from_byte(0x09);
        assert_eq!(key.control_type, 4);
        assert!(key.set);
        assert_eq!(key.to_byte(), 0x09);
        assert_eq!(ControlKey::from_byte(0x0E).control_type, 7);
    }

    #[test]
    fn test_control_type_codes() {
        for code in 1..=7 {
            assert_eq!(ControlType::from_code(code).unwrap().code(), code);
        }
        assert_eq!(ControlType::from_code(0), None);
        assert_eq!(ControlType::from_code(0x40), None);
    }

    #[test]
    fn test_from_frame_requires_control_byte() {
        let frame = Frame::new(
            SensorId::default(),
            FrameHeader::new(0, false, PacketType::ControlResponse),
            vec![],
        );
        assert!(matches!(
            ControlMessage::from_frame(&frame),
            Err(WireSinkError::ControlPayloadTooShort { needed: 1, actual: 0 })
        ));
    }

    #[test]
    fn test_from_frame_splits_body() {
        let frame = Frame::new(
            SensorId::new([1, 2, 3, 4, 5, 6]),
            FrameHeader::new(0, false, PacketType::ControlResponse),
            vec![0x0C, 0xAB],
        );
        let msg = ControlMessage::from_frame(&frame).unwrap();
        assert_eq!(msg.kind(), Some(ControlType::Reset));
        assert_eq!(msg.request_set_flag, 0);
        assert_eq!(msg.body, vec![0xAB]);
        assert_eq!(msg.control_byte(), 0x0C);
    }
}
