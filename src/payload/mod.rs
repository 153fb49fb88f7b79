//! The payload module contains the parameter registry, the parameter entry
//! codec and the typed values they decode into.

pub mod entry;
pub mod registry;
pub mod value;

pub use entry::{LengthFlag, ParameterEntry, ParameterReader};
pub use registry::{decode_value, lookup, lookup_by_name, ParamInfo, ParamKey};
pub use value::{TypedValue, ValueKind};

use crate::error::WireSinkError;
use log::{debug, warn};
use serde::Serialize;

/// A parameter decoded against the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedParameter {
    pub type_code: u16,
    pub name: &'static str,
    pub unit: &'static str,
    pub value: TypedValue,
}

/// Result of walking a parameter list: everything that decoded, plus the
/// per-entry errors that were skipped.
#[derive(Debug, Default)]
pub struct ParameterList {
    pub values: Vec<DecodedParameter>,
    pub errors: Vec<WireSinkError>,
}

impl ParameterList {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Decodes up to `count` entries from `payload`.
///
/// Unknown type codes and width mismatches skip only their entry. A truncated
/// entry ends the walk but keeps the values decoded before it.
pub fn decode_parameters(payload: &[u8], count: usize) -> ParameterList {
    let mut list = ParameterList::default();

    for item in ParameterReader::new(payload, count) {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Parameter list truncated: {}", e);
                list.errors.push(e);
                break;
            }
        };

        let type_code = entry.type_code();
        let Some(info) = lookup(type_code) else {
            warn!("Skipping unknown parameter type 0x{:04X}", type_code);
            list.errors.push(WireSinkError::UnknownParameterType(type_code));
            continue;
        };

        match info.decode(&entry.data) {
            Ok(value) => {
                debug!("Decoded {} = {} {}", info.name, value, info.unit);
                list.values.push(DecodedParameter {
                    type_code,
                    name: info.name,
                    unit: info.unit,
                    value,
                });
            }
            Err(e) => {
                warn!("Skipping parameter {}: {}", info.name, e);
                list.errors.push(e);
            }
        }
    }

    list
}
