//! Unit tests for the `WireSinkError` enum and its `Display` output.

use wiresink_rs::error::WireSinkError;
use wiresink_rs::util::hex::HexError;
use wiresink_rs::SensorId;

/// Tests that the `ChecksumMismatch` variant is correctly formatted.
#[test]
fn test_checksum_mismatch_error() {
    let err = WireSinkError::ChecksumMismatch {
        received: 0x1234,
        calculated: 0xABCD,
    };
    assert_eq!(
        err.to_string(),
        "Invalid checksum: received 0x1234, calculated 0xABCD"
    );
}

/// Tests that the `FrameTooShort` variant is correctly formatted.
#[test]
fn test_frame_too_short_error() {
    let err = WireSinkError::FrameTooShort { len: 4, min: 9 };
    assert_eq!(err.to_string(), "Frame too short: 4 bytes, need at least 9");
}

/// Tests that identities print in their canonical hex form.
#[test]
fn test_unknown_sensor_identity_error() {
    let err = WireSinkError::UnknownSensorIdentity(SensorId::new([0xAB, 0, 0, 0, 0, 0x01]));
    assert_eq!(err.to_string(), "Unknown sensor identity AB0000000001");
}

#[test]
fn test_unknown_parameter_type_error() {
    let err = WireSinkError::UnknownParameterType(0x1A2B);
    assert_eq!(err.to_string(), "Unknown parameter type 0x1A2B");
}

#[test]
fn test_hex_error_conversion() {
    let err: WireSinkError = HexError::OddLength(3).into();
    assert!(matches!(err, WireSinkError::InvalidHexString(_)));
}

/// Only envelope failures discard a whole frame.
#[test]
fn test_frame_fatal_kinds() {
    assert!(WireSinkError::FrameTooShort { len: 0, min: 9 }.is_frame_fatal());
    assert!(WireSinkError::ChecksumMismatch {
        received: 0,
        calculated: 1
    }
    .is_frame_fatal());
    assert!(!WireSinkError::UnknownParameterType(1).is_frame_fatal());
    assert!(!WireSinkError::MalformedShardPiece("x".into()).is_frame_fatal());
    assert!(!WireSinkError::ShardLimitExceeded {
        field: "piece count",
        value: 129,
        max: 128
    }
    .is_frame_fatal());
    assert!(!WireSinkError::ParameterHeaderOutOfBounds { offset: 3 }.is_frame_fatal());
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: WireSinkError = io.into();
    assert!(err.to_string().starts_with("I/O error"));
}
