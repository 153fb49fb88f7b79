//! Frame checksum.
//!
//! Every frame, inbound or outbound, carries a CRC-16/MODBUS over all bytes
//! preceding the checksum field (polynomial 0x8005 reflected, initial value
//! 0xFFFF, no final xor). The field itself is transmitted big-endian.

use crc::{Crc, CRC_16_MODBUS};

const FRAME_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Calculates the 16-bit frame checksum over `bytes`.
pub fn checksum(bytes: &[u8]) -> u16 {
    FRAME_CRC.checksum(bytes)
}

/// Appends the checksum of `buf` to it, high byte first.
pub fn append_checksum(buf: &mut Vec<u8>) {
    let crc = checksum(buf);
    buf.extend_from_slice(&crc.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_check_value() {
        assert_eq!(checksum(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_empty_input_is_initial_value() {
        assert_eq!(checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_append_checksum_big_endian() {
        let mut buf = b"123456789".to_vec();
        append_checksum(&mut buf);
        assert_eq!(&buf[9..], &[0x4B, 0x37]);
    }

    proptest! {
        #[test]
        fn prop_checksum_is_deterministic(data in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(checksum(&data), checksum(&data.clone()));
        }
    }
}
