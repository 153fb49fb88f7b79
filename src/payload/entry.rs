//! # Parameter Entries
//!
//! A parameter entry is a little-endian 16-bit head packing the 14-bit type
//! code and a 2-bit length flag, an optional explicit length field, then the
//! value bytes:
//!
//! | flag | length field            | data bytes |
//! |------|-------------------------|------------|
//! | 0    | none                    | 4          |
//! | 1    | 1 byte                  | N          |
//! | 2    | 2 bytes, little-endian  | N          |
//! | 3    | 3 bytes, big-endian     | N          |

use super::registry::lookup_by_name;
use crate::constants::{PARAM_IMPLICIT_LEN, PARAM_LENGTH_FLAG_MASK, PARAM_TYPE_MASK};
use crate::error::WireSinkError;
use bytes::{BufMut, BytesMut};
use nom::bytes::complete::take;
use nom::combinator::map;
use nom::number::complete::{be_u24, be_u8, le_u16};
use nom::IResult;

/// How the byte length of a parameter's data is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthFlag {
    /// No length field, data is always 4 bytes.
    Implicit,
    OneByte,
    TwoBytes,
    ThreeBytes,
}

impl LengthFlag {
    pub fn from_bits(bits: u16) -> Self {
        match bits & PARAM_LENGTH_FLAG_MASK {
            0 => LengthFlag::Implicit,
            1 => LengthFlag::OneByte,
            2 => LengthFlag::TwoBytes,
            _ => LengthFlag::ThreeBytes,
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            LengthFlag::Implicit => 0,
            LengthFlag::OneByte => 1,
            LengthFlag::TwoBytes => 2,
            LengthFlag::ThreeBytes => 3,
        }
    }

    /// Size of the explicit length field in bytes.
    pub fn field_len(self) -> usize {
        self.bits() as usize
    }

    /// Largest data length this flag can describe.
    pub fn max_len(self) -> usize {
        match self {
            LengthFlag::Implicit => PARAM_IMPLICIT_LEN,
            LengthFlag::OneByte => 0xFF,
            LengthFlag::TwoBytes => 0xFFFF,
            LengthFlag::ThreeBytes => 0xFF_FFFF,
        }
    }

    /// Smallest explicit flag whose length field can hold `len`.
    pub fn smallest_for(len: usize) -> Option<Self> {
        [
            LengthFlag::OneByte,
            LengthFlag::TwoBytes,
            LengthFlag::ThreeBytes,
        ]
        .into_iter()
        .find(|flag| len <= flag.max_len())
    }
}

/// One serialized parameter: head, resolved length and value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterEntry {
    pub head16: u16,
    pub length: usize,
    pub data: Vec<u8>,
}

impl ParameterEntry {
    /// Builds an entry from a raw type code, validating `data` against the flag.
    pub fn new(type_code: u16, flag: LengthFlag, data: Vec<u8>) -> Result<Self, WireSinkError> {
        let fits = match flag {
            LengthFlag::Implicit => data.len() == PARAM_IMPLICIT_LEN,
            _ => data.len() <= flag.max_len(),
        };
        if !fits {
            return Err(WireSinkError::ParameterLengthMismatch {
                name: format!("0x{:04X}", type_code & PARAM_TYPE_MASK),
                expected: flag.max_len(),
                actual: data.len(),
            });
        }
        Ok(ParameterEntry {
            head16: ((type_code & PARAM_TYPE_MASK) << 2) | flag.bits(),
            length: data.len(),
            data,
        })
    }

    /// Builds an entry for a registered parameter name.
    ///
    /// Four-byte scalars use the implicit flag, narrower scalars a one-byte
    /// length, and arrays the smallest length field that fits.
    pub fn named(name: &str, data: Vec<u8>) -> Result<Self, WireSinkError> {
        let (type_code, info) = lookup_by_name(name)
            .ok_or_else(|| WireSinkError::UnknownParameterName(name.to_string()))?;

        let flag = match info.byte_len() {
            Some(width) if data.len() != width => {
                return Err(WireSinkError::ParameterLengthMismatch {
                    name: name.to_string(),
                    expected: width,
                    actual: data.len(),
                });
            }
            Some(PARAM_IMPLICIT_LEN) => LengthFlag::Implicit,
            Some(_) => LengthFlag::OneByte,
            None => {
                info.decode(&data)?;
                LengthFlag::smallest_for(data.len()).ok_or_else(|| {
                    WireSinkError::ParameterLengthMismatch {
                        name: name.to_string(),
                        expected: LengthFlag::ThreeBytes.max_len(),
                        actual: data.len(),
                    }
                })?
            }
        };
        ParameterEntry::new(type_code, flag, data)
    }

    pub fn type_code(&self) -> u16 {
        self.head16 >> 2
    }

    pub fn length_flag(&self) -> LengthFlag {
        LengthFlag::from_bits(self.head16)
    }

    pub fn encoded_len(&self) -> usize {
        2 + self.length_flag().field_len() + self.data.len()
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.head16);
        match self.length_flag() {
            LengthFlag::Implicit => {}
            LengthFlag::OneByte => buf.put_u8(self.length as u8),
            LengthFlag::TwoBytes => buf.put_u16_le(self.length as u16),
            LengthFlag::ThreeBytes => buf.put_slice(&(self.length as u32).to_be_bytes()[1..]),
        }
        buf.put_slice(&self.data);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.to_vec()
    }
}

fn parse_head(input: &[u8]) -> IResult<&[u8], u16> {
    le_u16(input)
}

fn parse_length(flag: LengthFlag, input: &[u8]) -> IResult<&[u8], usize> {
    match flag {
        LengthFlag::Implicit => Ok((input, PARAM_IMPLICIT_LEN)),
        LengthFlag::OneByte => map(be_u8, usize::from)(input),
        LengthFlag::TwoBytes => map(le_u16, usize::from)(input),
        LengthFlag::ThreeBytes => map(be_u24, |v: u32| v as usize)(input),
    }
}

fn parse_data(len: usize, input: &[u8]) -> IResult<&[u8], &[u8]> {
    take(len)(input)
}

/// Iterates the entries of a parameter list.
///
/// Yields at most `count` items. A truncated head, length field or data
/// region yields one error and ends the iteration, because the position of
/// any later entry is unknown.
#[derive(Debug, Clone)]
pub struct ParameterReader<'a> {
    payload: &'a [u8],
    offset: usize,
    remaining: usize,
    done: bool,
}

impl<'a> ParameterReader<'a> {
    pub fn new(payload: &'a [u8], count: usize) -> Self {
        ParameterReader {
            payload,
            offset: 0,
            remaining: count,
            done: false,
        }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn read_entry(&self) -> Result<(usize, ParameterEntry), WireSinkError> {
        let start = self.offset;
        let input = &self.payload[start..];
        let header_oob = |_| WireSinkError::ParameterHeaderOutOfBounds { offset: start };

        let (rest, head16) = parse_head(input).map_err(header_oob)?;
        let flag = LengthFlag::from_bits(head16);
        let (rest, length) = parse_length(flag, rest).map_err(header_oob)?;

        let available = rest.len();
        let (rest, data) =
            parse_data(length, rest).map_err(|_| WireSinkError::ParameterDataOutOfBounds {
                offset: start,
                declared: length,
                available,
            })?;

        let entry = ParameterEntry {
            head16,
            length,
            data: data.to_vec(),
        };
        Ok((input.len() - rest.len(), entry))
    }
}

impl Iterator for ParameterReader<'_> {
    type Item = Result<ParameterEntry, WireSinkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        match self.read_entry() {
            Ok((consumed, entry)) => {
                self.offset += consumed;
                Some(Ok(entry))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_implicit_entry_layout() {
        let entry = ParameterEntry::new(0x0005, LengthFlag::Implicit, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(entry.head16, 0x0014);
        assert_eq!(entry.to_bytes(), vec![0x14, 0x00, 1, 2, 3, 4]);
    }

    #[test]
    fn test_length_field_endianness() {
        let two = ParameterEntry::new(0x003C, LengthFlag::TwoBytes, vec![0xAA; 0x0102]).unwrap();
        let bytes = two.to_bytes();
        assert_eq!(&bytes[2..4], &[0x02, 0x01]);

        let three = ParameterEntry::new(0x003C, LengthFlag::ThreeBytes, vec![0xBB; 0x0102]).unwrap();
        let bytes = three.to_bytes();
        assert_eq!(&bytes[2..5], &[0x00, 0x01, 0x02]);
    }

    #[test]
    fn test_new_rejects_bad_implicit_width() {
        assert!(matches!(
            ParameterEntry::new(0x0005, LengthFlag::Implicit, vec![1, 2]),
            Err(WireSinkError::ParameterLengthMismatch { expected: 4, actual: 2, .. })
        ));
        assert!(ParameterEntry::new(0x0005, LengthFlag::OneByte, vec![0; 256]).is_err());
    }

    #[test]
    fn test_named_picks_length_flag() {
        let temp = ParameterEntry::named("Temperature", 20.0f32.to_le_bytes().to_vec()).unwrap();
        assert_eq!(temp.length_flag(), LengthFlag::Implicit);
        assert_eq!(temp.type_code(), 0x0005);

        let battery = ParameterEntry::named("BatteryRemaining", vec![0x50, 0x00]).unwrap();
        assert_eq!(battery.length_flag(), LengthFlag::OneByte);

        let wave = ParameterEntry::named("Waveform", vec![0; 400]).unwrap();
        assert_eq!(wave.length_flag(), LengthFlag::TwoBytes);
    }

    #[test]
    fn test_named_validation() {
        assert!(matches!(
            ParameterEntry::named("Bogus", vec![]),
            Err(WireSinkError::UnknownParameterName(_))
        ));
        assert!(matches!(
            ParameterEntry::named("HeartbeatStatus", vec![1, 2]),
            Err(WireSinkError::ParameterLengthMismatch { expected: 1, actual: 2, .. })
        ));
        assert!(matches!(
            ParameterEntry::named("Waveform", vec![0; 5]),
            Err(WireSinkError::ParameterDecodeFailure { .. })
        ));
    }

    #[test]
    fn test_reader_walks_mixed_entries() {
        let mut payload = ParameterEntry::new(0x0005, LengthFlag::Implicit, vec![0; 4])
            .unwrap()
            .to_bytes();
        payload.extend(
            ParameterEntry::new(0x001C, LengthFlag::OneByte, vec![0x01])
                .unwrap()
                .to_bytes(),
        );
        let entries: Vec<_> = ParameterReader::new(&payload, 2)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].type_code(), 0x001C);
        assert_eq!(entries[1].data, vec![0x01]);
    }

    #[test]
    fn test_reader_stops_on_truncation() {
        // One complete entry, then a head with a one-byte length of 9 but only 2 bytes.
        let mut payload = vec![0x14, 0x00, 1, 2, 3, 4];
        payload.extend([0x71, 0x00, 0x09, 0xAA, 0xBB]);
        let mut reader = ParameterReader::new(&payload, 5);
        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(
            reader.next(),
            Some(Err(WireSinkError::ParameterDataOutOfBounds {
                offset: 6,
                declared: 9,
                available: 2
            }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_reader_header_out_of_bounds() {
        let payload = [0x14];
        let mut reader = ParameterReader::new(&payload, 1);
        assert!(matches!(
            reader.next(),
            Some(Err(WireSinkError::ParameterHeaderOutOfBounds { offset: 0 }))
        ));

        // Head present, 3-byte length field cut short.
        let payload = [0x03, 0x00, 0x00, 0x01];
        assert!(matches!(
            ParameterReader::new(&payload, 1).next(),
            Some(Err(WireSinkError::ParameterHeaderOutOfBounds { offset: 0 }))
        ));
    }

    proptest! {
        #[test]
        fn prop_implicit_flag_reads_four_bytes(type_code in 0u16..0x4000, data in prop::array::uniform4(any::<u8>())) {
            let bytes = ParameterEntry::new(type_code, LengthFlag::Implicit, data.to_vec()).unwrap().to_bytes();
            let entry = ParameterReader::new(&bytes, 1).next().unwrap().unwrap();
            prop_assert_eq!(entry.length, 4);
            prop_assert_eq!(&entry.data, &data.to_vec());
            prop_assert_eq!(entry.type_code(), type_code);
        }

        #[test]
        fn prop_one_byte_length(len in 0usize..=0xFF) {
            let bytes = ParameterEntry::new(0x0001, LengthFlag::OneByte, vec![0x5A; len]).unwrap().to_bytes();
            let entry = ParameterReader::new(&bytes, 1).next().unwrap().unwrap();
            prop_assert_eq!(entry.length, len);
            prop_assert_eq!(entry.length_flag(), LengthFlag::OneByte);
        }

        #[test]
        fn prop_two_byte_length(len in 0usize..=0xFFFF) {
            let bytes = ParameterEntry::new(0x0001, LengthFlag::TwoBytes, vec![0; len]).unwrap().to_bytes();
            let entry = ParameterReader::new(&bytes, 1).next().unwrap().unwrap();
            prop_assert_eq!(entry.length, len);
        }

        #[test]
        fn prop_three_byte_length(len in prop::sample::select(vec![0usize, 1, 0xFF, 0x100, 0xFFFF, 0x10000, 0xFF_FFFF])) {
            let bytes = ParameterEntry::new(0x0001, LengthFlag::ThreeBytes, vec![0; len]).unwrap().to_bytes();
            let entry = ParameterReader::new(&bytes, 1).next().unwrap().unwrap();
            prop_assert_eq!(entry.length, len);
            prop_assert_eq!(entry.data.len(), len);
        }
    }
}
