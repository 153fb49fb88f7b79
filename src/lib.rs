//! # wiresink-rs - Business-Message Layer for Wired Sensor Gateways
//!
//! The wiresink-rs crate turns raw byte streams from wired sensors into typed
//! parameter values, and turns outgoing commands into framed, checksummed
//! byte streams.
//!
//! ## Features
//!
//! - Frame envelope codec with CRC-16/MODBUS validation
//! - Parameter registry and variable-length value codec
//! - Control request encoders and a dispatcher for control responses
//! - Per-sensor fragment reassembly with acknowledgements and timeout eviction
//! - A two-task gateway pipeline wired to pluggable collaborators
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! wiresink-rs = "0.1.0"
//! ```
//!
//! ```rust
//! use wiresink_rs::{decode_frame, decode_parameters, encode_frame, Frame, FrameHeader, PacketType, SensorId};
//! use wiresink_rs::payload::ParameterEntry;
//!
//! let id: SensorId = "238A08262319".parse().unwrap();
//! let payload = ParameterEntry::named("Temperature", 21.5f32.to_le_bytes().to_vec())
//!     .unwrap()
//!     .to_bytes();
//! let raw = encode_frame(&Frame::new(id, FrameHeader::new(1, false, PacketType::Monitoring), payload));
//!
//! let frame = decode_frame(&raw).unwrap();
//! let list = decode_parameters(&frame.payload, frame.param_count.into());
//! assert_eq!(list.values[0].name, "Temperature");
//! ```

pub mod collaborators;
pub mod config;
pub mod constants;
pub mod control;
pub mod error;
pub mod frame;
pub mod gateway;
pub mod logging;
pub mod payload;
pub mod shard;
pub mod util;

pub use crate::error::WireSinkError;
pub use crate::logging::{init_logger, init_logger_with_level};

// Envelope
pub use frame::{
    checksum, decode_frame, encode_data_status, encode_frame, DataStatus, Frame, FrameHeader,
    PacketType, SensorId,
};

// Parameters
pub use payload::{decode_parameters, DecodedParameter, ParameterList, TypedValue};

// Control
pub use control::{ControlDispatcher, ControlMessage, ControlRequest};

// Reassembly
pub use shard::{ShardAck, ShardEngine, ShardPiece};

// Gateway
pub use collaborators::{IdentityRegistry, Reporter, Transport, ValueStore};
pub use config::GatewayConfig;
pub use gateway::{Collaborators, CommandIssuer, DeviceCommand, Gateway, GatewayHandle};
