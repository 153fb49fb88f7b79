//! Wire Sink Protocol Constants
//!
//! This module defines constants used by the sensor frame codec, the control
//! message layer and the shard reassembly engine.

/// Sensor identity length in bytes
pub const SENSOR_ID_LEN: usize = 6;

/// Header byte length
pub const FRAME_HEADER_LEN: usize = 1;

/// Trailing checksum length
pub const FRAME_CHECKSUM_LEN: usize = 2;

/// Smallest valid envelope: identity + header + checksum
pub const FRAME_MIN_LEN: usize = SENSOR_ID_LEN + FRAME_HEADER_LEN + FRAME_CHECKSUM_LEN;

// ----------------------------------------------------------------------------
// Header byte: paramCount(4) | fragmented(1) | packetType(3)
// ----------------------------------------------------------------------------

pub const HEADER_PARAM_COUNT_SHIFT: u8 = 4;
pub const HEADER_PARAM_COUNT_MASK: u8 = 0x0F;
pub const HEADER_FRAGMENTED_MASK: u8 = 0x08;
pub const HEADER_PACKET_TYPE_MASK: u8 = 0x07;

/// paramCount value meaning "all parameters" in query requests
pub const PARAM_COUNT_ALL: u8 = 0x0F;

// Packet type codes (3 bits)
pub const PACKET_TYPE_MONITORING: u8 = 0b000;
pub const PACKET_TYPE_MONITORING_RESPONSE: u8 = 0b001;
pub const PACKET_TYPE_ALARM: u8 = 0b010;
pub const PACKET_TYPE_ALARM_RESPONSE: u8 = 0b011;
pub const PACKET_TYPE_CONTROL_REQUEST: u8 = 0b100;
pub const PACKET_TYPE_CONTROL_RESPONSE: u8 = 0b101;
pub const PACKET_TYPE_SHARD_ACK: u8 = 0b110;
pub const PACKET_TYPE_RESERVED: u8 = 0b111;

// Data-status acknowledgement byte
pub const DATA_STATUS_SUCCESS: u8 = 0xFF;
pub const DATA_STATUS_FAILURE: u8 = 0x00;

// ----------------------------------------------------------------------------
// Parameter entries
// ----------------------------------------------------------------------------

/// Length flag mask in the 16-bit parameter head
pub const PARAM_LENGTH_FLAG_MASK: u16 = 0x0003;

/// Data length implied by length flag 0
pub const PARAM_IMPLICIT_LEN: usize = 4;

/// Feature group occupies the top 3 bits of the 14-bit type code
pub const PARAM_FEATURE_SHIFT: u16 = 11;
pub const PARAM_FEATURE_MASK: u16 = 0x07;
pub const PARAM_CODE_MASK: u16 = 0x07FF;
pub const PARAM_TYPE_MASK: u16 = 0x3FFF;

// ----------------------------------------------------------------------------
// Control messages
// ----------------------------------------------------------------------------

pub const CONTROL_TYPE_GENERAL_PARAMETERS: u8 = 0x01;
pub const CONTROL_TYPE_MONITORING_DATA: u8 = 0x02;
pub const CONTROL_TYPE_ALARM_PARAMETERS: u8 = 0x03;
pub const CONTROL_TYPE_TIME: u8 = 0x04;
pub const CONTROL_TYPE_SENSOR_ID: u8 = 0x05;
pub const CONTROL_TYPE_RESET: u8 = 0x06;
pub const CONTROL_TYPE_RESET_TRIGGER: u8 = 0x07;

/// Upper bound of named parameters in one general-parameter request
pub const MAX_PARAMS_PER_REQUEST: usize = 16;

// ----------------------------------------------------------------------------
// Shard pieces and acknowledgements
// ----------------------------------------------------------------------------

/// Control word (2) + piece length (2)
pub const SHARD_HEADER_LEN: usize = 4;

pub const SHARD_ACK_SHIFT: u16 = 14;
pub const SHARD_SEQUENCE_SHIFT: u16 = 8;
pub const SHARD_SEQUENCE_MASK: u16 = 0x3F;
pub const SHARD_END_MASK: u16 = 0x0080;
pub const SHARD_PIECE_MASK: u16 = 0x007F;

pub const SHARD_ACK_SUCCESS: u8 = 0b11;
pub const SHARD_ACK_FAILURE: u8 = 0b00;

/// Identity + control word + checksum
pub const SHARD_ACK_FRAME_LEN: usize = SENSOR_ID_LEN + 2 + FRAME_CHECKSUM_LEN;

/// Seconds without progress before a reassembly is evicted
pub const DEFAULT_REASSEMBLY_TIMEOUT_SECS: u64 = 20;

// ----------------------------------------------------------------------------
// Value-store resource names written by the core
// ----------------------------------------------------------------------------

pub const RESOURCE_SENSOR_ID: &str = "eid";
pub const RESOURCE_LAST_DATA_TIMESTAMP: &str = "lastDataTimestamp";
pub const RESOURCE_TIMESTAMP: &str = "timestamp";
pub const RESOURCE_RESET_STATUS: &str = "reset_ctl";

/// Default source tag passed to the reporting callback
pub const DEFAULT_SOURCE_TAG: &str = "AsyncReporting";
