//! The frame module contains the outer envelope shared by every sensor frame:
//! the 6-byte sensor identity, the header byte, the payload and the trailing
//! checksum.

pub mod checksum;
pub mod codec;

pub use checksum::checksum;
pub use codec::{
    decode_frame, encode_data_status, encode_frame, peek_envelope, DataStatus,
};

use crate::constants::{
    HEADER_FRAGMENTED_MASK, HEADER_PACKET_TYPE_MASK, HEADER_PARAM_COUNT_MASK,
    HEADER_PARAM_COUNT_SHIFT, PACKET_TYPE_ALARM, PACKET_TYPE_ALARM_RESPONSE,
    PACKET_TYPE_CONTROL_REQUEST, PACKET_TYPE_CONTROL_RESPONSE, PACKET_TYPE_MONITORING,
    PACKET_TYPE_MONITORING_RESPONSE, PACKET_TYPE_SHARD_ACK, SENSOR_ID_LEN,
};
use crate::error::WireSinkError;
use std::fmt;
use std::str::FromStr;

/// A 6-byte sensor identity, displayed as 12 uppercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SensorId([u8; SENSOR_ID_LEN]);

impl SensorId {
    pub const fn new(bytes: [u8; SENSOR_ID_LEN]) -> Self {
        SensorId(bytes)
    }

    /// Builds an identity from a slice that must be exactly 6 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, WireSinkError> {
        let arr: [u8; SENSOR_ID_LEN] = bytes.try_into().map_err(|_| {
            WireSinkError::InvalidSensorId(format!(
                "expected {SENSOR_ID_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(SensorId(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SENSOR_ID_LEN] {
        &self.0
    }

    /// Canonical uppercase hex form, e.g. `238A08262319`.
    pub fn to_hex(&self) -> String {
        crate::util::hex::encode_hex_upper(&self.0)
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for SensorId {
    type Err = WireSinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = crate::util::hex::decode_hex(s.trim())?;
        SensorId::from_slice(&bytes)
    }
}

impl From<[u8; SENSOR_ID_LEN]> for SensorId {
    fn from(bytes: [u8; SENSOR_ID_LEN]) -> Self {
        SensorId(bytes)
    }
}

/// The 3-bit packet type carried in the low bits of the header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Monitoring,
    MonitoringResponse,
    Alarm,
    AlarmResponse,
    ControlRequest,
    ControlResponse,
    ShardAck,
    Reserved,
}

impl PacketType {
    /// Maps the low 3 bits of `bits`; every value has a variant.
    pub fn from_bits(bits: u8) -> Self {
        match bits & HEADER_PACKET_TYPE_MASK {
            PACKET_TYPE_MONITORING => PacketType::Monitoring,
            PACKET_TYPE_MONITORING_RESPONSE => PacketType::MonitoringResponse,
            PACKET_TYPE_ALARM => PacketType::Alarm,
            PACKET_TYPE_ALARM_RESPONSE => PacketType::AlarmResponse,
            PACKET_TYPE_CONTROL_REQUEST => PacketType::ControlRequest,
            PACKET_TYPE_CONTROL_RESPONSE => PacketType::ControlResponse,
            PACKET_TYPE_SHARD_ACK => PacketType::ShardAck,
            _ => PacketType::Reserved,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            PacketType::Monitoring => PACKET_TYPE_MONITORING,
            PacketType::MonitoringResponse => PACKET_TYPE_MONITORING_RESPONSE,
            PacketType::Alarm => PACKET_TYPE_ALARM,
            PacketType::AlarmResponse => PACKET_TYPE_ALARM_RESPONSE,
            PacketType::ControlRequest => PACKET_TYPE_CONTROL_REQUEST,
            PacketType::ControlResponse => PACKET_TYPE_CONTROL_RESPONSE,
            PacketType::ShardAck => PACKET_TYPE_SHARD_ACK,
            PacketType::Reserved => crate::constants::PACKET_TYPE_RESERVED,
        }
    }

    /// Business frames carry parameter lists (monitoring or alarm data).
    pub fn is_business(self) -> bool {
        matches!(self, PacketType::Monitoring | PacketType::Alarm)
    }

    pub fn is_control(self) -> bool {
        matches!(self, PacketType::ControlRequest | PacketType::ControlResponse)
    }

    /// Packet type used when acknowledging a business frame's data status.
    pub fn status_response(self) -> Option<PacketType> {
        match self {
            PacketType::Monitoring => Some(PacketType::MonitoringResponse),
            PacketType::Alarm => Some(PacketType::AlarmResponse),
            _ => None,
        }
    }
}

/// The unpacked header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub param_count: u8,
    pub fragmented: bool,
    pub packet_type: PacketType,
}

impl FrameHeader {
    pub fn new(param_count: u8, fragmented: bool, packet_type: PacketType) -> Self {
        FrameHeader {
            param_count: param_count & HEADER_PARAM_COUNT_MASK,
            fragmented,
            packet_type,
        }
    }

    pub fn from_byte(byte: u8) -> Self {
        FrameHeader {
            param_count: (byte >> HEADER_PARAM_COUNT_SHIFT) & HEADER_PARAM_COUNT_MASK,
            fragmented: byte & HEADER_FRAGMENTED_MASK != 0,
            packet_type: PacketType::from_bits(byte),
        }
    }

    pub fn to_byte(self) -> u8 {
        ((self.param_count & HEADER_PARAM_COUNT_MASK) << HEADER_PARAM_COUNT_SHIFT)
            | if self.fragmented { HEADER_FRAGMENTED_MASK } else { 0 }
            | self.packet_type.bits()
    }
}

/// Represents a sensor frame envelope.
///
/// `checksum` always matches `checksum(identity ‖ header ‖ payload)`: the
/// decoder rejects anything else and [`Frame::new`] computes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub identity: SensorId,
    pub param_count: u8,
    pub fragmented: bool,
    pub packet_type: PacketType,
    pub payload: Vec<u8>,
    pub checksum: u16,
}

impl Frame {
    pub fn new(identity: SensorId, header: FrameHeader, payload: Vec<u8>) -> Self {
        let mut frame = Frame {
            identity,
            param_count: header.param_count,
            fragmented: header.fragmented,
            packet_type: header.packet_type,
            payload,
            checksum: 0,
        };
        frame.checksum = checksum::checksum(&frame.body_bytes());
        frame
    }

    pub fn header(&self) -> FrameHeader {
        FrameHeader::new(self.param_count, self.fragmented, self.packet_type)
    }

    /// Identity, header byte and payload: everything the checksum covers.
    pub(crate) fn body_bytes(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(SENSOR_ID_LEN + 1 + self.payload.len());
        body.extend_from_slice(self.identity.as_bytes());
        body.push(self.header().to_byte());
        body.extend_from_slice(&self.payload);
        body
    }

    /// Packs the frame, appending a freshly computed checksum.
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode_frame(self)
    }
}
