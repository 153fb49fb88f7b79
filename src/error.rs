//! # Wire Sink Error Handling
//!
//! This module defines the WireSinkError enum, which represents the different error
//! types that can occur in the wiresink-rs crate.
//!
//! Only `FrameTooShort` and `ChecksumMismatch` abort processing of a whole frame.
//! Every other kind is local to one parameter, one control message or one shard
//! piece, and the pipeline logs it and moves on.

use crate::frame::SensorId;
use thiserror::Error;

/// Represents the different error types that can occur in the wire sink crate.
#[derive(Debug, Error)]
pub enum WireSinkError {
    /// The raw frame is shorter than identity + header + checksum.
    #[error("Frame too short: {len} bytes, need at least {min}")]
    FrameTooShort { len: usize, min: usize },

    /// The trailing checksum does not match the computed one.
    #[error("Invalid checksum: received 0x{received:04X}, calculated 0x{calculated:04X}")]
    ChecksumMismatch { received: u16, calculated: u16 },

    /// No logical device is registered for this sensor identity.
    #[error("Unknown sensor identity {0}")]
    UnknownSensorIdentity(SensorId),

    /// A parameter head (or its length field) runs past the end of the payload.
    #[error("Parameter header out of bounds at offset {offset}")]
    ParameterHeaderOutOfBounds { offset: usize },

    /// A parameter declares more data than the payload holds.
    #[error("Parameter data out of bounds at offset {offset}: declared {declared}, available {available}")]
    ParameterDataOutOfBounds {
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// The 14-bit type code is not in the parameter registry.
    #[error("Unknown parameter type 0x{0:04X}")]
    UnknownParameterType(u16),

    /// The value bytes have the wrong width for the declared type.
    #[error("Failed to decode {name}: expected {expected}, got {actual} bytes")]
    ParameterDecodeFailure {
        name: &'static str,
        expected: String,
        actual: usize,
    },

    /// Request/set flag outside 0..=1.
    #[error("Invalid request/set flag {0}, must be 0 or 1")]
    InvalidRequestSetFlag(u8),

    /// A fragmented frame whose shard header or piece length is inconsistent.
    #[error("Malformed shard piece: {0}")]
    MalformedShardPiece(String),

    /// An outbound piece field does not fit its wire width.
    #[error("Shard {field} {value} exceeds maximum {max}")]
    ShardLimitExceeded {
        field: &'static str,
        value: usize,
        max: usize,
    },

    /// A reassembly made no progress within the configured timeout.
    #[error("Reassembly timed out for sensor {0}")]
    ReassemblyTimeout(SensorId),

    /// Indicates an invalid hexadecimal string was provided.
    #[error("Invalid hexadecimal string: {0}")]
    InvalidHexString(String),

    /// A sensor identity that is not exactly 6 bytes.
    #[error("Invalid sensor identity: {0}")]
    InvalidSensorId(String),

    /// Parameter list length outside what the request supports.
    #[error("Invalid parameter count {count}, must be 1..={max}")]
    InvalidParameterCount { count: usize, max: usize },

    /// No registry entry carries this parameter name.
    #[error("Unknown parameter name {0:?}")]
    UnknownParameterName(String),

    /// Caller-supplied data does not match the registered parameter width.
    #[error("Parameter {name:?} length mismatch: want {expected}, got {actual}")]
    ParameterLengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A control response body is shorter than its handler needs.
    #[error("Control payload too short: need {needed}, got {actual}")]
    ControlPayloadTooShort { needed: usize, actual: usize },

    /// The logical device is not known to the value store.
    #[error("Unknown device {0:?}")]
    UnknownDevice(String),

    /// The device has no usable stored sensor identity.
    #[error("Device {0:?} has no stored sensor identity")]
    MissingSensorIdentity(String),

    /// A write command resource name that maps to no control request.
    #[error("Unknown command resource {0:?}")]
    UnknownCommand(String),

    /// Outbound transport hand-off failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid gateway configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The shard engine no longer accepts pieces.
    #[error("Shard engine shut down")]
    ShutDown,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<crate::util::hex::HexError> for WireSinkError {
    fn from(err: crate::util::hex::HexError) -> Self {
        WireSinkError::InvalidHexString(err.to_string())
    }
}

impl WireSinkError {
    /// Whether this error discards the whole frame rather than a single item.
    pub fn is_frame_fatal(&self) -> bool {
        matches!(
            self,
            WireSinkError::FrameTooShort { .. } | WireSinkError::ChecksumMismatch { .. }
        )
    }
}
