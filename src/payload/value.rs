//! # Parameter Value Decoding
//!
//! Values in parameter entries are little-endian scalars or packed arrays of
//! scalars. [`ValueKind`] names the declared shape of a registered parameter;
//! [`TypedValue`] is what comes out of decoding it.

use crate::error::WireSinkError;
use serde::Serialize;
use std::fmt;

/// Declared value shape of a registered parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueKind {
    U8,
    U16,
    U32,
    I16,
    F32,
    U16Array,
    U32Array,
    I16Array,
    F32Array,
}

impl ValueKind {
    /// Width of one element in bytes.
    pub fn element_len(self) -> usize {
        match self {
            ValueKind::U8 => 1,
            ValueKind::U16 | ValueKind::I16 | ValueKind::U16Array | ValueKind::I16Array => 2,
            ValueKind::U32 | ValueKind::F32 | ValueKind::U32Array | ValueKind::F32Array => 4,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            ValueKind::U16Array | ValueKind::U32Array | ValueKind::I16Array | ValueKind::F32Array
        )
    }

    /// Exact byte width for scalars, `None` for variable-length arrays.
    pub fn fixed_len(self) -> Option<usize> {
        if self.is_array() {
            None
        } else {
            Some(self.element_len())
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            ValueKind::U8 => "uint8",
            ValueKind::U16 => "uint16",
            ValueKind::U32 => "uint32",
            ValueKind::I16 => "int16",
            ValueKind::F32 => "float32",
            ValueKind::U16Array => "uint16[]",
            ValueKind::U32Array => "uint32[]",
            ValueKind::I16Array => "int16[]",
            ValueKind::F32Array => "float32[]",
        }
    }

    /// Length-checked little-endian decode of `bytes` into this shape.
    ///
    /// Scalars need exactly their width; arrays need a whole multiple of the
    /// element width (zero elements is allowed).
    pub fn decode(self, name: &'static str, bytes: &[u8]) -> Result<TypedValue, WireSinkError> {
        let width = self.element_len();
        let fits = if self.is_array() {
            bytes.len() % width == 0
        } else {
            bytes.len() == width
        };
        if !fits {
            let expected = if self.is_array() {
                format!("a multiple of {width} bytes")
            } else {
                format!("{width} bytes")
            };
            return Err(WireSinkError::ParameterDecodeFailure {
                name,
                expected,
                actual: bytes.len(),
            });
        }

        let value = match self {
            ValueKind::U8 => TypedValue::U8(bytes[0]),
            ValueKind::U16 => TypedValue::U16(u16::from_le_bytes([bytes[0], bytes[1]])),
            ValueKind::I16 => TypedValue::I16(i16::from_le_bytes([bytes[0], bytes[1]])),
            ValueKind::U32 => TypedValue::U32(le_u32(bytes)),
            ValueKind::F32 => TypedValue::F32(f32::from_bits(le_u32(bytes))),
            ValueKind::U16Array => TypedValue::U16Array(
                bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            ValueKind::I16Array => TypedValue::I16Array(
                bytes
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            ValueKind::U32Array => {
                TypedValue::U32Array(bytes.chunks_exact(4).map(le_u32).collect())
            }
            ValueKind::F32Array => TypedValue::F32Array(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_bits(le_u32(c)))
                    .collect(),
            ),
        };
        Ok(value)
    }
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// A decoded parameter value, or a value the gateway itself records in the
/// value store (timestamps and identity strings).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    U8(u8),
    U16(u16),
    U32(u32),
    I16(i16),
    F32(f32),
    U16Array(Vec<u16>),
    U32Array(Vec<u32>),
    I16Array(Vec<i16>),
    F32Array(Vec<f32>),
    I64(i64),
    Text(String),
}

impl TypedValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of scalar integer values.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            TypedValue::U8(v) => Some(v.into()),
            TypedValue::U16(v) => Some(v.into()),
            TypedValue::U32(v) => Some(v.into()),
            TypedValue::I16(v) => Some(v.into()),
            TypedValue::I64(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::U8(v) => write!(f, "{v}"),
            TypedValue::U16(v) => write!(f, "{v}"),
            TypedValue::U32(v) => write!(f, "{v}"),
            TypedValue::I16(v) => write!(f, "{v}"),
            TypedValue::F32(v) => write!(f, "{v}"),
            TypedValue::U16Array(v) => write!(f, "{v:?}"),
            TypedValue::U32Array(v) => write!(f, "{v:?}"),
            TypedValue::I16Array(v) => write!(f, "{v:?}"),
            TypedValue::F32Array(v) => write!(f, "{v:?}"),
            TypedValue::I64(v) => write!(f, "{v}"),
            TypedValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::Text(s.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::Text(s)
    }
}
