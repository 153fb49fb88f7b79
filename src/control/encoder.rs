//! Outbound control request builders.
//!
//! Every request is a `ControlRequest` packet: the target identity, a header
//! with packet type 4, the control byte, an optional body and a big-endian
//! checksum.

use super::{ControlKey, ControlType};
use crate::constants::{MAX_PARAMS_PER_REQUEST, PARAM_COUNT_ALL, SENSOR_ID_LEN};
use crate::error::WireSinkError;
use crate::frame::{Frame, FrameHeader, PacketType, SensorId};
use crate::payload::ParameterEntry;
use bytes::{BufMut, BytesMut};

/// A control request, independent of its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Reset,
    /// `epoch_secs` is sent as zero when querying.
    Time { flag: u8, epoch_secs: u32 },
    /// `new_id` is sent zero-filled when querying.
    SensorIdentity { flag: u8, new_id: Option<SensorId> },
    /// An empty list is only valid for a query, which asks for every parameter.
    GeneralParameters { flag: u8, entries: Vec<ParameterEntry> },
    MonitoringDataQuery,
    AlarmParametersQuery,
}

fn check_flag(flag: u8) -> Result<bool, WireSinkError> {
    match flag {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(WireSinkError::InvalidRequestSetFlag(other)),
    }
}

fn control_frame(
    target: SensorId,
    param_count: u8,
    control_type: ControlType,
    set: bool,
    body: &[u8],
) -> Frame {
    let mut payload = BytesMut::with_capacity(1 + body.len());
    payload.put_u8(
        ControlKey {
            control_type: control_type.code(),
            set,
        }
        .to_byte(),
    );
    payload.put_slice(body);
    Frame::new(
        target,
        FrameHeader::new(param_count, false, PacketType::ControlRequest),
        payload.to_vec(),
    )
}

impl ControlRequest {
    pub fn control_type(&self) -> ControlType {
        match self {
            ControlRequest::Reset => ControlType::Reset,
            ControlRequest::Time { .. } => ControlType::Time,
            ControlRequest::SensorIdentity { .. } => ControlType::SensorIdentity,
            ControlRequest::GeneralParameters { .. } => ControlType::GeneralParameters,
            ControlRequest::MonitoringDataQuery => ControlType::MonitoringData,
            ControlRequest::AlarmParametersQuery => ControlType::AlarmParameters,
        }
    }

    /// Builds the request frame addressed to `target`.
    pub fn to_frame(&self, target: SensorId) -> Result<Frame, WireSinkError> {
        let kind = self.control_type();
        let frame = match self {
            ControlRequest::Reset => control_frame(target, 0, kind, false, &[]),
            ControlRequest::Time { flag, epoch_secs } => {
                let set = check_flag(*flag)?;
                let secs = if set { *epoch_secs } else { 0 };
                control_frame(target, 0, kind, set, &secs.to_le_bytes())
            }
            ControlRequest::SensorIdentity { flag, new_id } => {
                let set = check_flag(*flag)?;
                let body = match (set, new_id) {
                    (true, Some(id)) => *id.as_bytes(),
                    _ => [0u8; SENSOR_ID_LEN],
                };
                control_frame(target, 0, kind, set, &body)
            }
            ControlRequest::GeneralParameters { flag, entries } => {
                let set = check_flag(*flag)?;
                if entries.is_empty() && !set {
                    control_frame(target, PARAM_COUNT_ALL, kind, set, &[])
                } else {
                    if entries.is_empty() || entries.len() > MAX_PARAMS_PER_REQUEST {
                        return Err(WireSinkError::InvalidParameterCount {
                            count: entries.len(),
                            max: MAX_PARAMS_PER_REQUEST,
                        });
                    }
                    let mut body = BytesMut::new();
                    for entry in entries {
                        entry.encode_into(&mut body);
                    }
                    // 16 entries wrap to a count of 0 in the 4-bit field.
                    control_frame(target, (entries.len() & 0x0F) as u8, kind, set, &body)
                }
            }
            ControlRequest::MonitoringDataQuery | ControlRequest::AlarmParametersQuery => {
                control_frame(target, PARAM_COUNT_ALL, kind, false, &[])
            }
        };
        Ok(frame)
    }

    pub fn encode(&self, target: SensorId) -> Result<Vec<u8>, WireSinkError> {
        Ok(self.to_frame(target)?.to_bytes())
    }
}

/// Reset request: no body.
pub fn reset_request(target: SensorId) -> Vec<u8> {
    control_frame(target, 0, ControlType::Reset, false, &[]).to_bytes()
}

/// Time query (`flag` 0) or set (`flag` 1) carrying little-endian epoch seconds.
pub fn time_request(target: SensorId, flag: u8, epoch_secs: u32) -> Result<Vec<u8>, WireSinkError> {
    ControlRequest::Time { flag, epoch_secs }.encode(target)
}

/// Sensor identity query (`flag` 0) or set (`flag` 1) to `new_id`.
pub fn sensor_id_request(
    target: SensorId,
    flag: u8,
    new_id: Option<SensorId>,
) -> Result<Vec<u8>, WireSinkError> {
    ControlRequest::SensorIdentity { flag, new_id }.encode(target)
}

/// General parameter query or set for 1..=16 entries. An empty query asks
/// for every parameter; an empty set is refused.
pub fn general_parameters_request(
    target: SensorId,
    flag: u8,
    entries: &[ParameterEntry],
) -> Result<Vec<u8>, WireSinkError> {
    ControlRequest::GeneralParameters {
        flag,
        entries: entries.to_vec(),
    }
    .encode(target)
}

pub fn monitoring_data_query(target: SensorId) -> Vec<u8> {
    control_frame(target, PARAM_COUNT_ALL, ControlType::MonitoringData, false, &[]).to_bytes()
}

pub fn alarm_parameters_query(target: SensorId) -> Vec<u8> {
    control_frame(target, PARAM_COUNT_ALL, ControlType::AlarmParameters, false, &[]).to_bytes()
}
