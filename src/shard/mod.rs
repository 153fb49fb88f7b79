//! # Shard Pieces and Acknowledgements
//!
//! A fragmented frame carries one piece of a larger payload. The piece starts
//! with a big-endian control word and a little-endian length:
//!
//! ```text
//!  15 14 | 13 ...  8 | 7   | 6 ...  0 | 16 bits LE | length bytes
//!  ack   | shard seq | end | piece seq| length     | data
//! ```
//!
//! Every piece is answered with a 10-byte acknowledgement: identity, the
//! control word with `ack = 0b11` (continue) or `0b00` (restart), and a
//! checksum.

pub mod engine;
pub mod reassembly;

pub use engine::ShardEngine;
pub use reassembly::{Expiry, PieceOutcome, ReassemblyTable, TimerAction};

use crate::constants::{
    FRAME_CHECKSUM_LEN, SENSOR_ID_LEN, SHARD_ACK_FAILURE, SHARD_ACK_FRAME_LEN, SHARD_ACK_SHIFT,
    SHARD_ACK_SUCCESS, SHARD_END_MASK, SHARD_HEADER_LEN, SHARD_PIECE_MASK, SHARD_SEQUENCE_MASK,
    SHARD_SEQUENCE_SHIFT,
};
use crate::error::WireSinkError;
use crate::frame::{checksum, SensorId};
use bytes::{BufMut, BytesMut};
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, le_u16};
use nom::IResult;

/// One piece of a fragmented payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPiece {
    pub shard_sequence: u8,
    pub piece_sequence: u8,
    pub end: bool,
    pub data: Vec<u8>,
}

fn split_word(word: u16) -> (u8, u8, bool) {
    (
        ((word >> SHARD_SEQUENCE_SHIFT) & SHARD_SEQUENCE_MASK) as u8,
        (word & SHARD_PIECE_MASK) as u8,
        word & SHARD_END_MASK != 0,
    )
}

fn parse_piece_header(input: &[u8]) -> IResult<&[u8], (u16, u16)> {
    let (input, word) = be_u16(input)?;
    let (input, len) = le_u16(input)?;
    Ok((input, (word, len)))
}

fn parse_piece_data(len: usize, input: &[u8]) -> IResult<&[u8], &[u8]> {
    take(len)(input)
}

impl ShardPiece {
    pub fn new(shard_sequence: u8, piece_sequence: u8, end: bool, data: Vec<u8>) -> Self {
        ShardPiece {
            shard_sequence: shard_sequence & SHARD_SEQUENCE_MASK as u8,
            piece_sequence: piece_sequence & SHARD_PIECE_MASK as u8,
            end,
            data,
        }
    }

    /// Parses a fragmented frame's payload.
    pub fn parse(payload: &[u8]) -> Result<Self, WireSinkError> {
        let (rest, (word, len)) = parse_piece_header(payload).map_err(|_| {
            WireSinkError::MalformedShardPiece(format!(
                "header needs {} bytes, got {}",
                SHARD_HEADER_LEN,
                payload.len()
            ))
        })?;
        let available = rest.len();
        let (_, data) = parse_piece_data(usize::from(len), rest).map_err(|_| {
            WireSinkError::MalformedShardPiece(format!(
                "declared {len} bytes, {available} available"
            ))
        })?;

        let (shard_sequence, piece_sequence, end) = split_word(word);
        Ok(ShardPiece {
            shard_sequence,
            piece_sequence,
            end,
            data: data.to_vec(),
        })
    }

    /// Best-effort shard and piece sequence of a payload that may not parse,
    /// for addressing a negative acknowledgement.
    pub fn peek_sequence(payload: &[u8]) -> (u8, u8) {
        match payload {
            [hi, lo, ..] => {
                let (sseq, pseq, _) = split_word(u16::from_be_bytes([*hi, *lo]));
                (sseq, pseq)
            }
            _ => (0, 0),
        }
    }

    pub fn is_start(&self) -> bool {
        self.piece_sequence == 0
    }

    /// Fails when the data does not fit the 16-bit length field.
    pub fn encode(&self) -> Result<Vec<u8>, WireSinkError> {
        let len = u16::try_from(self.data.len()).map_err(|_| WireSinkError::ShardLimitExceeded {
            field: "piece length",
            value: self.data.len(),
            max: usize::from(u16::MAX),
        })?;
        let word = (u16::from(self.shard_sequence) & SHARD_SEQUENCE_MASK) << SHARD_SEQUENCE_SHIFT
            | if self.end { SHARD_END_MASK } else { 0 }
            | (u16::from(self.piece_sequence) & SHARD_PIECE_MASK);
        let mut buf = BytesMut::with_capacity(SHARD_HEADER_LEN + self.data.len());
        buf.put_u16(word);
        buf.put_u16_le(len);
        buf.put_slice(&self.data);
        Ok(buf.to_vec())
    }

    /// Splits `payload` into consecutive pieces of at most `max_len` bytes,
    /// marking the last one as the end piece.
    ///
    /// The piece sequence is 7 bits wide, so at most 128 pieces fit in one
    /// shard; a payload needing more is refused rather than wrapped.
    pub fn split(
        shard_sequence: u8,
        payload: &[u8],
        max_len: usize,
    ) -> Result<Vec<ShardPiece>, WireSinkError> {
        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![payload]
        } else {
            payload.chunks(max_len.max(1)).collect()
        };
        let max_pieces = usize::from(SHARD_PIECE_MASK) + 1;
        if chunks.len() > max_pieces {
            return Err(WireSinkError::ShardLimitExceeded {
                field: "piece count",
                value: chunks.len(),
                max: max_pieces,
            });
        }
        let last = chunks.len() - 1;
        Ok(chunks
            .into_iter()
            .zip(0u8..)
            .map(|(chunk, i)| {
                ShardPiece::new(shard_sequence, i, usize::from(i) == last, chunk.to_vec())
            })
            .collect())
    }
}

/// Acknowledgement for one piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardAck {
    pub success: bool,
    pub shard_sequence: u8,
    pub piece_sequence: u8,
}

impl ShardAck {
    pub fn success(shard_sequence: u8, piece_sequence: u8) -> Self {
        ShardAck {
            success: true,
            shard_sequence,
            piece_sequence,
        }
    }

    pub fn failure(shard_sequence: u8, piece_sequence: u8) -> Self {
        ShardAck {
            success: false,
            shard_sequence,
            piece_sequence,
        }
    }

    pub fn word(&self) -> u16 {
        let ack = if self.success {
            SHARD_ACK_SUCCESS
        } else {
            SHARD_ACK_FAILURE
        };
        (u16::from(ack) << SHARD_ACK_SHIFT)
            | ((u16::from(self.shard_sequence) & SHARD_SEQUENCE_MASK) << SHARD_SEQUENCE_SHIFT)
            | (u16::from(self.piece_sequence) & SHARD_PIECE_MASK)
    }

    pub fn from_word(word: u16) -> Self {
        let (shard_sequence, piece_sequence, _) = split_word(word);
        ShardAck {
            success: (word >> SHARD_ACK_SHIFT) as u8 == SHARD_ACK_SUCCESS,
            shard_sequence,
            piece_sequence,
        }
    }

    /// identity(6) + control word (BE) + checksum (BE).
    pub fn encode(&self, identity: SensorId) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(SHARD_ACK_FRAME_LEN);
        buf.put_slice(identity.as_bytes());
        buf.put_u16(self.word());
        let crc = checksum(&buf);
        buf.put_u16(crc);
        buf.to_vec()
    }

    pub fn decode(raw: &[u8]) -> Result<(SensorId, ShardAck), WireSinkError> {
        if raw.len() != SHARD_ACK_FRAME_LEN {
            return Err(WireSinkError::FrameTooShort {
                len: raw.len(),
                min: SHARD_ACK_FRAME_LEN,
            });
        }
        let (body, trailer) = raw.split_at(SHARD_ACK_FRAME_LEN - FRAME_CHECKSUM_LEN);
        let received = u16::from_be_bytes([trailer[0], trailer[1]]);
        let calculated = checksum(body);
        if received != calculated {
            return Err(WireSinkError::ChecksumMismatch {
                received,
                calculated,
            });
        }
        let identity = SensorId::from_slice(&body[..SENSOR_ID_LEN])?;
        let word = u16::from_be_bytes([body[SENSOR_ID_LEN], body[SENSOR_ID_LEN + 1]]);
        Ok((identity, ShardAck::from_word(word)))
    }
}
