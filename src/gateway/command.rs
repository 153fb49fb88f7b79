//! Driver-level write commands.
//!
//! A write to one of the command resources of a device turns into a control
//! request addressed to the device's stored sensor identity.

use crate::collaborators::{Transport, ValueStore};
use crate::control::dispatch::stored_identity;
use crate::control::ControlRequest;
use crate::error::WireSinkError;
use crate::logging::log_frame;
use crate::payload::TypedValue;
use log::{debug, info};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCommand {
    TimeQuery,
    TimeSet,
    Reset,
    IdentityQuery,
    GeneralParameterQuery,
    AlarmParameterQuery,
    MonitoringDataQuery,
}

impl DeviceCommand {
    pub const ALL: [DeviceCommand; 7] = [
        DeviceCommand::TimeQuery,
        DeviceCommand::TimeSet,
        DeviceCommand::Reset,
        DeviceCommand::IdentityQuery,
        DeviceCommand::GeneralParameterQuery,
        DeviceCommand::AlarmParameterQuery,
        DeviceCommand::MonitoringDataQuery,
    ];

    /// The resource name that triggers this command.
    pub fn resource_name(self) -> &'static str {
        match self {
            DeviceCommand::TimeQuery => "Time_Parameter_Query",
            DeviceCommand::TimeSet => "Time_Parameter_Set",
            DeviceCommand::Reset => "Reset_Set",
            DeviceCommand::IdentityQuery => "ID_Query",
            DeviceCommand::GeneralParameterQuery => "General_Parameter_Query",
            DeviceCommand::AlarmParameterQuery => "Alarm_Parameter_Query",
            DeviceCommand::MonitoringDataQuery => "Monitoring_Data_Query",
        }
    }

    /// The control request for this command. `now_secs` is only used by
    /// [`DeviceCommand::TimeSet`].
    pub fn request(self, now_secs: u32) -> ControlRequest {
        match self {
            DeviceCommand::TimeQuery => ControlRequest::Time {
                flag: 0,
                epoch_secs: 0,
            },
            DeviceCommand::TimeSet => ControlRequest::Time {
                flag: 1,
                epoch_secs: now_secs,
            },
            DeviceCommand::Reset => ControlRequest::Reset,
            DeviceCommand::IdentityQuery => ControlRequest::SensorIdentity {
                flag: 0,
                new_id: None,
            },
            DeviceCommand::GeneralParameterQuery => ControlRequest::GeneralParameters {
                flag: 0,
                entries: Vec::new(),
            },
            DeviceCommand::AlarmParameterQuery => ControlRequest::AlarmParametersQuery,
            DeviceCommand::MonitoringDataQuery => ControlRequest::MonitoringDataQuery,
        }
    }
}

impl FromStr for DeviceCommand {
    type Err = WireSinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceCommand::ALL
            .into_iter()
            .find(|cmd| cmd.resource_name() == s)
            .ok_or_else(|| WireSinkError::UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_name())
    }
}

/// Encodes device commands and hands them to the transport.
#[derive(Clone)]
pub struct CommandIssuer {
    store: Arc<dyn ValueStore>,
    transport: Arc<dyn Transport>,
}

impl CommandIssuer {
    pub fn new(store: Arc<dyn ValueStore>, transport: Arc<dyn Transport>) -> Self {
        CommandIssuer { store, transport }
    }

    /// Sends `command` to `device`, returning the bytes sent.
    pub async fn issue(
        &self,
        device: &str,
        command: DeviceCommand,
    ) -> Result<Vec<u8>, WireSinkError> {
        if !self.store.contains_device(device) {
            return Err(WireSinkError::UnknownDevice(device.to_string()));
        }
        let target = stored_identity(self.store.as_ref(), device)?;

        let now = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX);
        let bytes = command.request(now).encode(target)?;
        info!("Issuing {} to {} ({})", command, device, target);
        log_frame("TX", &bytes);
        self.transport.send(target, bytes.clone()).await?;
        Ok(bytes)
    }

    /// Handles a write to a device resource. Only a value of 1 triggers the
    /// command; anything else is ignored. Returns whether a request was sent.
    pub async fn handle_write(
        &self,
        device: &str,
        resource: &str,
        value: &TypedValue,
    ) -> Result<bool, WireSinkError> {
        let command: DeviceCommand = resource.parse()?;
        if value.as_i64() != Some(1) {
            debug!("{} on {} ignored for value {}", command, device, value);
            return Ok(false);
        }
        self.issue(device, command).await?;
        Ok(true)
    }
}
