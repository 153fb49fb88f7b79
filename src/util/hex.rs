//! # Hex Encoding/Decoding Utilities
//!
//! Sensor identities travel as 12-character uppercase hex strings, and the
//! transport bridge hands frames around as hex text. This module keeps those
//! conversions in one place, built on the `hex` crate.
//!
//! ## Usage
//!
//! ```rust
//! use wiresink_rs::util::hex::{decode_hex, encode_hex_upper, pretty_hex};
//!
//! let data = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
//! let hex_str = encode_hex_upper(&data);
//! assert_eq!(hex_str, "AABBCCDDEEFF");
//!
//! let decoded = decode_hex(&hex_str).unwrap();
//! assert_eq!(decoded, data);
//!
//! println!("{}", pretty_hex(&data, 16));
//! ```

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Encode bytes to uppercase hex string, the canonical identity form.
pub fn encode_hex_upper(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Decode hex string to bytes
///
/// Accepts both uppercase and lowercase hex characters.
/// Whitespace is automatically stripped.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Parse hex that may carry separators such as `AA-BB:CC` or `0xAA 0xBB`.
///
/// A leading `0x` on each token is dropped before non-hex characters are
/// filtered out.
pub fn parse_hex_lenient(input: &str) -> Result<Vec<u8>, HexError> {
    let hex_chars: String = input
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|token| token.trim_start_matches("0x").trim_start_matches("0X"))
        .flat_map(|token| token.chars())
        .filter(|c| c.is_ascii_hexdigit())
        .collect();

    decode_hex(&hex_chars)
}

/// Format hex data for compact display (useful for logs): `AA BB CC`.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pretty-print frame bytes as an offset-prefixed dump.
///
/// Each line holds `bytes_per_line` bytes, grouped in pairs, followed by a
/// printable-ASCII column.
pub fn pretty_hex(data: &[u8], bytes_per_line: usize) -> String {
    if data.is_empty() || bytes_per_line == 0 {
        return String::new();
    }

    let lines: Vec<String> = data
        .chunks(bytes_per_line)
        .enumerate()
        .map(|(i, chunk)| {
            let mut line = format!("{:04x}: ", i * bytes_per_line);
            for (j, byte) in chunk.iter().enumerate() {
                line.push_str(&format!("{byte:02X}"));
                if j % 2 == 1 {
                    line.push(' ');
                }
            }
            let width = bytes_per_line * 2 + bytes_per_line / 2;
            let used = chunk.len() * 2 + chunk.len() / 2;
            line.push_str(&" ".repeat(width.saturating_sub(used)));
            line.push('|');
            line.extend(chunk.iter().map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    b as char
                } else {
                    '.'
                }
            }));
            line.push('|');
            line
        })
        .collect();

    lines.join("\n")
}
