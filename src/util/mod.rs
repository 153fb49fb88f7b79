//! # Utility Modules
//!
//! Common helpers shared by the codec, the CLI and the tests.

pub mod hex;

pub use hex::{decode_hex, encode_hex_upper, format_hex_compact, parse_hex_lenient, pretty_hex};
