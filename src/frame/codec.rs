//! # Frame Envelope Codec
//!
//! Decodes and encodes the envelope shared by every frame:
//!
//! ```text
//! +-------------+--------+-----------------+-------------+
//! | identity(6) | header | payload (0..n)  | checksum BE |
//! +-------------+--------+-----------------+-------------+
//! ```
//!
//! Decoding validates the length and the checksum before anything else is
//! looked at, so a corrupted frame never reaches application state.
//!
//! ```rust
//! use wiresink_rs::frame::{decode_frame, encode_frame, Frame, FrameHeader, PacketType, SensorId};
//!
//! let id = SensorId::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
//! let frame = Frame::new(id, FrameHeader::new(1, false, PacketType::Monitoring), vec![0x01, 0x02]);
//! let bytes = encode_frame(&frame);
//! assert_eq!(decode_frame(&bytes).unwrap(), frame);
//! ```

use super::checksum::checksum;
use super::{Frame, FrameHeader, SensorId};
use crate::constants::{
    DATA_STATUS_FAILURE, DATA_STATUS_SUCCESS, FRAME_CHECKSUM_LEN, FRAME_MIN_LEN, SENSOR_ID_LEN,
};
use crate::error::WireSinkError;
use bytes::{BufMut, BytesMut};
use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use nom::sequence::tuple;
use nom::IResult;

/// Status byte of a data-status acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStatus {
    Success,
    Failure,
}

impl DataStatus {
    pub fn byte(self) -> u8 {
        match self {
            DataStatus::Success => DATA_STATUS_SUCCESS,
            DataStatus::Failure => DATA_STATUS_FAILURE,
        }
    }
}

/// Parses identity and header byte, leaving the payload as the remainder.
fn parse_envelope(input: &[u8]) -> IResult<&[u8], (&[u8], u8)> {
    tuple((take(SENSOR_ID_LEN), be_u8))(input)
}

fn split_envelope(body: &[u8]) -> Result<(SensorId, FrameHeader, &[u8]), WireSinkError> {
    let (payload, (identity, header)) =
        parse_envelope(body).map_err(|_| WireSinkError::FrameTooShort {
            len: body.len() + FRAME_CHECKSUM_LEN,
            min: FRAME_MIN_LEN,
        })?;
    Ok((
        SensorId::from_slice(identity)?,
        FrameHeader::from_byte(header),
        payload,
    ))
}

fn check_length(raw: &[u8]) -> Result<(), WireSinkError> {
    if raw.len() < FRAME_MIN_LEN {
        return Err(WireSinkError::FrameTooShort {
            len: raw.len(),
            min: FRAME_MIN_LEN,
        });
    }
    Ok(())
}

/// Decodes and validates a raw frame.
///
/// # Errors
///
/// * `FrameTooShort` when `raw` is shorter than identity + header + checksum.
/// * `ChecksumMismatch` when the trailing big-endian checksum differs from the
///   one computed over the preceding bytes.
pub fn decode_frame(raw: &[u8]) -> Result<Frame, WireSinkError> {
    check_length(raw)?;

    let (body, trailer) = raw.split_at(raw.len() - FRAME_CHECKSUM_LEN);
    let received = u16::from_be_bytes([trailer[0], trailer[1]]);
    let calculated = checksum(body);
    if received != calculated {
        return Err(WireSinkError::ChecksumMismatch {
            received,
            calculated,
        });
    }

    let (identity, header, payload) = split_envelope(body)?;
    Ok(Frame {
        identity,
        param_count: header.param_count,
        fragmented: header.fragmented,
        packet_type: header.packet_type,
        payload: payload.to_vec(),
        checksum: received,
    })
}

/// Reads identity and header without validating the checksum.
///
/// Used to address a failure acknowledgement to the sender of a frame that
/// failed checksum validation. Nothing read here may be trusted further.
pub fn peek_envelope(raw: &[u8]) -> Result<(SensorId, FrameHeader), WireSinkError> {
    check_length(raw)?;
    let (identity, header, _) = split_envelope(&raw[..raw.len() - FRAME_CHECKSUM_LEN])?;
    Ok((identity, header))
}

/// Packs a frame, appending a freshly computed checksum.
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(FRAME_MIN_LEN + frame.payload.len());
    buf.put_slice(frame.identity.as_bytes());
    buf.put_u8(frame.header().to_byte());
    buf.put_slice(&frame.payload);
    let crc = checksum(&buf);
    buf.put_u16(crc);
    buf.to_vec()
}

/// Builds the 10-byte data-status acknowledgement:
/// identity + header + status byte + checksum.
pub fn encode_data_status(identity: SensorId, header: FrameHeader, status: DataStatus) -> Vec<u8> {
    encode_frame(&Frame::new(identity, header, vec![status.byte()]))
}
