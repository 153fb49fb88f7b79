//! # Parameter Registry
//!
//! A process-wide, immutable table mapping a 14-bit parameter type code to its
//! display name, unit and value shape. The type code splits into a 3-bit
//! feature group (bits 13..11) and an 11-bit code (bits 10..0); the pair is the
//! lookup key.
//!
//! ```rust
//! use wiresink_rs::payload::registry::{lookup, lookup_by_name};
//!
//! let info = lookup(0x0005).unwrap();
//! assert_eq!(info.name, "Temperature");
//!
//! let (type_code, _) = lookup_by_name("Methane").unwrap();
//! assert_eq!(type_code, (2 << 11) | 136);
//! ```

use super::value::{TypedValue, ValueKind};
use crate::constants::{PARAM_CODE_MASK, PARAM_FEATURE_MASK, PARAM_FEATURE_SHIFT, PARAM_TYPE_MASK};
use crate::error::WireSinkError;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Registry key: (feature group, code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamKey {
    pub feature: u8,
    pub code: u16,
}

impl ParamKey {
    pub fn from_type_code(type_code: u16) -> Self {
        ParamKey {
            feature: ((type_code >> PARAM_FEATURE_SHIFT) & PARAM_FEATURE_MASK) as u8,
            code: type_code & PARAM_CODE_MASK,
        }
    }

    pub fn type_code(self) -> u16 {
        ((u16::from(self.feature) & PARAM_FEATURE_MASK) << PARAM_FEATURE_SHIFT)
            | (self.code & PARAM_CODE_MASK)
    }
}

/// Descriptor of a registered parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamInfo {
    pub name: &'static str,
    pub unit: &'static str,
    pub kind: ValueKind,
}

impl ParamInfo {
    /// Expected byte length, `None` when the caller determines it.
    pub fn byte_len(&self) -> Option<usize> {
        self.kind.fixed_len()
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<TypedValue, WireSinkError> {
        self.kind.decode(self.name, bytes)
    }
}

/// Registered parameter types: (feature group, code, name, unit, value kind).
pub const PARAM_CODES: &[(u8, u16, &str, &str, ValueKind)] = &[
    // General state parameters (feature group 0)
    (0, 0x001, "Length", "m", ValueKind::F32),
    (0, 0x002, "Mass", "kg", ValueKind::F32),
    (0, 0x003, "Time", "s", ValueKind::U32),
    (0, 0x004, "ElectricCurrent", "A", ValueKind::F32),
    (0, 0x005, "Temperature", "℃", ValueKind::F32),
    (0, 0x006, "AmountOfSubstance", "mol", ValueKind::F32),
    (0, 0x007, "LuminousIntensity", "cd", ValueKind::F32),
    (0, 0x01C, "HeartbeatStatus", "", ValueKind::U8),
    (0, 0x01D, "BatteryRemaining", "%", ValueKind::U16),
    (0, 0x01E, "BatteryVoltage", "V", ValueKind::F32),
    (0, 0x01F, "SensorSelfTestStatus", "", ValueKind::U8),
    (0, 0x020, "NetworkConnectionStatus", "", ValueKind::U8),
    (0, 0x021, "PowerStatus", "", ValueKind::U8),
    (0, 0x022, "DataCollectionInterval", "s", ValueKind::U16),
    (0, 0x023, "SignalStrength", "", ValueKind::F32),
    (0, 0x038, "PrimaryCurrent", "kA", ValueKind::F32),
    (0, 0x039, "SecondaryCurrent", "mA", ValueKind::F32),
    (0, 0x03A, "PrimaryVoltage", "kV", ValueKind::F32),
    (0, 0x03B, "SecondaryVoltage", "mV", ValueKind::F32),
    (0, 0x03C, "Waveform", "", ValueKind::F32Array),
    (0, 0x03D, "PhaseAngle", "°", ValueKind::F32),
    (0, 0x03E, "Phase", "", ValueKind::U16),
    (0, 0x03F, "Frequency", "Hz", ValueKind::F32),
    (0, 0x080, "ActivePower", "W", ValueKind::F32),
    (0, 0x081, "ReactivePower", "W", ValueKind::F32),
    (0, 0x082, "ElectricEnergy", "kWh", ValueKind::F32),
    (0, 0x083, "PowerFactor", "", ValueKind::F32),
    (0, 0x084, "VoltagePresenceIndicator", "", ValueKind::U16),
    (0, 0x085, "ElectricCharge", "C", ValueKind::F32),
    (0, 0x05A, "Longitude", "", ValueKind::F32),
    (0, 0x05B, "Latitude", "", ValueKind::F32),
    (0, 0x05C, "Altitude", "", ValueKind::F32),
    (0, 0x05D, "Displacement", "", ValueKind::F32),
    (0, 0x05E, "DisplacementTrajectory", "mm", ValueKind::F32Array),
    (0, 0x05F, "Velocity", "m/s", ValueKind::F32),
    (0, 0x060, "Acceleration", "m/s²", ValueKind::F32),
    (0, 0x061, "Angle", "rad", ValueKind::F32),
    (0, 0x062, "AngularVelocity", "rad/s", ValueKind::F32),
    (0, 0x063, "AngularAcceleration", "rad/s²", ValueKind::F32),
    (0, 0x064, "Strain", "%", ValueKind::F32),
    (0, 0x065, "StressOrPressure", "Pa", ValueKind::F32),
    (0, 0x066, "VibrationSpectrum", "m/s²", ValueKind::F32Array),
    (0, 0x067, "Force", "N", ValueKind::F32),

    // Transmission line parameters (feature group 1)
    (1, 0x001, "10minAvgWindSpeed", "m/s", ValueKind::F32),
    (1, 0x002, "10minAvgWindDirection", "°", ValueKind::I16),
    (1, 0x003, "MaxWindSpeed", "m/s", ValueKind::F32),
    (1, 0x024, "ExtremeWindSpeed", "m/s", ValueKind::F32),
    (1, 0x015, "StandardWindSpeed", "m/s", ValueKind::F32),
    (1, 0x006, "Temperature1", "°C", ValueKind::F32),
    (1, 0x007, "Humidity1", "%RH", ValueKind::U16),
    (1, 0x008, "Pressure", "hPa", ValueKind::F32),
    (1, 0x009, "Rainfall10min", "mm", ValueKind::F32),
    (1, 0x00A, "RainIntensity", "mm/min", ValueKind::F32),
    (1, 0x00B, "SolarRadiation", "W/m2", ValueKind::U16),
    (1, 0x00C, "InstantWindSpeed", "m/s", ValueKind::F32),
    (1, 0x00D, "InstantWindDirection", "°", ValueKind::I16),
    (1, 0x00E, "WindDirectionDeviation", "°", ValueKind::I16),

    // Substation parameters (feature group 2)
    (2, 0x001, "ArresterLeakageTotalCurrent", "mA", ValueKind::F32),
    (2, 0x002, "ArresterLeakageResistiveCurrent", "mA", ValueKind::F32),
    (2, 0x003, "LeakageCurrentSamplingPhase", "°", ValueKind::F32),
    (2, 0x004, "ArresterOperationCount", "times", ValueKind::U16),
    (2, 0x005, "ArresterResistiveLeakageCurrentPeak", "mA", ValueKind::F32),
    (2, 0x006, "BusVoltageSamplingPhase", "°", ValueKind::F32),
    (2, 0x01B, "TransformerCoreClipGroundingCurrent", "A", ValueKind::F32),
    (2, 0x01C, "TransformerCoreClipGroundingCurrentSpectrum", "A", ValueKind::U16Array),
    (2, 0x01D, "DielectricLossFactor", "°", ValueKind::F32),
    (2, 0x01E, "Capacitance", "pF", ValueKind::F32),
    (2, 0x01F, "TotalCurrent", "mA", ValueKind::F32),
    (2, 0x020, "InitialPhaseAngle", "°", ValueKind::F32),
    (2, 0x021, "ReferenceCurrent", "mA", ValueKind::F32),
    (2, 0x022, "ReferencePhaseAngle", "°", ValueKind::F32),
    (2, 0x037, "ClosingDisplacement", "mm", ValueKind::F32),
    (2, 0x038, "ClosingAngularDisplacement", "°", ValueKind::F32),
    (2, 0x039, "ClosingSpeed", "m/s", ValueKind::F32),
    (2, 0x03A, "ClosingTime", "s", ValueKind::F32),
    (2, 0x03B, "ClosingCoilCurrentPeak", "A", ValueKind::F32),
    (2, 0x03C, "ClosingCoilCurrentOnTime", "ms", ValueKind::F32),
    (2, 0x03D, "OpeningDisplacement", "mm", ValueKind::F32),
    (2, 0x03E, "OpeningAngularDisplacement", "°", ValueKind::F32),
    (2, 0x03F, "OpeningSpeed", "m/s", ValueKind::F32),
    (2, 0x040, "OpeningTime", "s", ValueKind::F32),
    (2, 0x041, "OpeningCoilCurrentPeak", "A", ValueKind::F32),
    (2, 0x042, "OpeningCoilCurrentOnTime", "ms", ValueKind::F32),
    (2, 0x043, "EnergyStorageMotorOperatingCurrentMax", "A", ValueKind::F32),
    (2, 0x044, "EnergyStorageMotorStartingCurrentMax", "A", ValueKind::F32),
    (2, 0x045, "EnergyStorageMotorCurrentDuration", "ms", ValueKind::F32),
    (2, 0x046, "MechanismOperationCount", "", ValueKind::U8),
    (2, 0x047, "SwitchContactPosition", "", ValueKind::U8),
    (2, 0x048, "DriveMechanismDisplacementTimeWaveform", "", ValueKind::F32Array),
    (2, 0x049, "ClosingCoilCurrentTimeWaveform", "", ValueKind::F32Array),
    (2, 0x04A, "OpeningCoilCurrentTimeWaveform", "", ValueKind::F32Array),
    (2, 0x04B, "EnergyStorageMotorCurrentTimeWaveform", "", ValueKind::F32Array),
    (2, 0x04C, "SwitchContactPressure", "N", ValueKind::F32),
    (2, 0x04D, "LoadTapChangerPosition", "", ValueKind::U16),
    (2, 0x062, "HighFrequencyMultiSpectrum", "", ValueKind::F32Array),
    (2, 0x063, "HighFrequencyPRPDSpectrum", "", ValueKind::F32Array),
    (2, 0x064, "HighFrequencyPRPSSpectrum", "", ValueKind::F32Array),
    (2, 0x065, "HighFrequencyTFSpectrum", "", ValueKind::F32Array),
    (2, 0x066, "UltraHighFrequencyMultiSpectrum", "", ValueKind::F32Array),
    (2, 0x067, "UltraHighFrequencyPRPDSpectrum", "", ValueKind::F32Array),
    (2, 0x068, "UltraHighFrequencyPRPSSpectrum", "", ValueKind::F32Array),
    (2, 0x069, "UltrasonicMultiSpectrum", "", ValueKind::F32Array),
    (2, 0x06A, "UltrasonicFeatureSpectrum", "", ValueKind::F32Array),
    (2, 0x06B, "UltrasonicPhaseSpectrum", "", ValueKind::F32Array),
    (2, 0x06C, "UltrasonicPulseSpectrum", "", ValueKind::F32Array),
    (2, 0x06D, "UltrasonicWaveform", "", ValueKind::F32Array),
    (2, 0x06E, "TransientVoltageMultiSpectrum", "", ValueKind::F32Array),
    (2, 0x06F, "TransientVoltageAmplitude", "", ValueKind::F32Array),
    (2, 0x070, "TransientVoltagePRPDSpectrum", "", ValueKind::F32Array),
    (2, 0x071, "TransientVoltagePRPSSpectrum", "", ValueKind::F32Array),
    (2, 0x072, "OscillationIncidentWave", "", ValueKind::F32Array),
    (2, 0x073, "OscillationReflectedWave", "", ValueKind::F32Array),
    (2, 0x088, "Methane", "μL/L", ValueKind::F32),
    (2, 0x089, "Ethane", "μL/L", ValueKind::F32),
    (2, 0x08A, "Ethylene", "μL/L", ValueKind::F32),
    (2, 0x08B, "Acetylene", "μL/L", ValueKind::F32),
    (2, 0x08C, "CarbonMonoxide", "μL/L", ValueKind::F32),
    (2, 0x08D, "CarbonDioxide", "μL/L", ValueKind::F32),
    (2, 0x08E, "Hydrogen", "μL/L", ValueKind::F32),
    (2, 0x08F, "WaterContent", "μL/L", ValueKind::F32),
    (2, 0x090, "Nitrogen", "μL/L", ValueKind::F32),
    (2, 0x091, "Oxygen", "μL/L", ValueKind::F32),
    (2, 0x092, "TotalHydrocarbon", "μL/L", ValueKind::F32),
    (2, 0x093, "OilTemperature", "℃", ValueKind::F32),
    (2, 0x094, "OilPressure", "Pa", ValueKind::F32),
    (2, 0x095, "TotalCombustibleGas", "μL/L", ValueKind::F32),
    (2, 0x096, "CarrierGasPressure", "MPa", ValueKind::F32),
    (2, 0x0AB, "SF6DewPoint", "°C", ValueKind::F32),
    (2, 0x0AC, "SF6Moisture", "μL/L", ValueKind::F32),
    (2, 0x0AD, "SF6Purity", "%", ValueKind::F32),
    (2, 0x0AE, "H2S", "μL/L", ValueKind::F32),
    (2, 0x0AF, "SO2", "μL/L", ValueKind::F32),
    (2, 0x0B0, "HF", "μL/L", ValueKind::F32),
    (2, 0x0B1, "SOF2", "μL/L", ValueKind::F32),
    (2, 0x0B2, "CF4", "μL/L", ValueKind::F32),
    (2, 0x0B3, "SO2F2", "μL/L", ValueKind::F32),
    (2, 0x0B4, "CO", "μL/L", ValueKind::F32),
    (2, 0x0B5, "CO2", "μL/L", ValueKind::F32),
    (2, 0x0B6, "SF6GaugePressure", "Pa", ValueKind::F32),
    (2, 0x0B7, "SF6AbsolutePressure", "Pa", ValueKind::F32),
    (2, 0x0B8, "SF6O2N2", "μL/L", ValueKind::F32),
    (2, 0x0B9, "SF6ActualPressure", "Pa", ValueKind::F32),
    (2, 0x0BA, "SF6Temperature", "°C", ValueKind::F32),
    (2, 0x0CF, "AmbientNitrogen", "μL/L", ValueKind::F32),
    (2, 0x0D0, "Ammonia", "μL/L", ValueKind::F32),
    (2, 0x0D1, "CombustibleGasConcentration", "μL/L", ValueKind::F32),
    (2, 0x0D2, "ToxicGasConcentration", "μL/L", ValueKind::F32),
    (2, 0x0D3, "SF6GasConcentration", "μL/L", ValueKind::F32),
    (2, 0x0D4, "OtherGasConcentration", "μL/L", ValueKind::F32),

    // Auxiliary facility parameters (feature group 3)
    (3, 0x001, "ArcFlashIntensity", "mW/cm2", ValueKind::F32),
    (3, 0x002, "Noise", "dB", ValueKind::F32),
    (3, 0x003, "WaterIngressStatus", "", ValueKind::U16),
    (3, 0x004, "WaterLevel", "m", ValueKind::F32),
    (3, 0x005, "Settlement", "mm", ValueKind::F32),
    (3, 0x006, "EquipmentRunningStatus", "", ValueKind::U8),
    (3, 0x007, "DoorWindowLockStatus", "", ValueKind::U8),
    (3, 0x008, "PerimeterAlarmStatus", "", ValueKind::U8),
    (3, 0x009, "ManholeCoverStatus", "", ValueKind::U8),
    (3, 0x00A, "SmokeDetectorStatus", "", ValueKind::U8),
    (3, 0x00B, "SwitchControl", "", ValueKind::U8),
    (3, 0x00C, "SwitchStatus", "", ValueKind::U8),
    (3, 0x00D, "ACSetTemperature", "℃", ValueKind::F32),
    (3, 0x00E, "ACCurrentTemperature", "℃", ValueKind::F32),
    (3, 0x023, "StringVoltage", "V", ValueKind::F32),
    (3, 0x024, "StringCurrent", "A", ValueKind::F32),
    (3, 0x025, "BatteryGroupStatus", "", ValueKind::U8),
    (3, 0x026, "BalanceDegree", "%", ValueKind::U16),
    (3, 0x027, "CellVoltage", "mV", ValueKind::F32),
    (3, 0x028, "CellInternalResistance", "mΩ", ValueKind::F32),
    (3, 0x029, "CellSOC", "%", ValueKind::U16),
    (3, 0x02A, "CellSOH", "%", ValueKind::U16),
    (3, 0x02B, "CellTemperature", "℃", ValueKind::F32),
];

static REGISTRY: Lazy<HashMap<ParamKey, ParamInfo>> = Lazy::new(|| {
    PARAM_CODES
        .iter()
        .map(|&(feature, code, name, unit, kind)| {
            (ParamKey { feature, code }, ParamInfo { name, unit, kind })
        })
        .collect()
});

static BY_NAME: Lazy<HashMap<&'static str, ParamKey>> = Lazy::new(|| {
    PARAM_CODES
        .iter()
        .map(|&(feature, code, name, _, _)| (name, ParamKey { feature, code }))
        .collect()
});

/// Looks up a 14-bit type code. Bits above the type code are ignored.
pub fn lookup(type_code: u16) -> Option<&'static ParamInfo> {
    REGISTRY.get(&ParamKey::from_type_code(type_code & PARAM_TYPE_MASK))
}

/// Resolves a parameter name to its type code and descriptor.
pub fn lookup_by_name(name: &str) -> Option<(u16, &'static ParamInfo)> {
    let key = BY_NAME.get(name)?;
    REGISTRY.get(key).map(|info| (key.type_code(), info))
}

/// Decodes `bytes` as the value of the registered parameter `info`.
pub fn decode_value(info: &ParamInfo, bytes: &[u8]) -> Result<TypedValue, WireSinkError> {
    info.decode(bytes)
}

/// All registered entries ordered by type code.
pub fn entries() -> Vec<(u16, &'static ParamInfo)> {
    let mut all: Vec<_> = REGISTRY.iter().map(|(k, v)| (k.type_code(), v)).collect();
    all.sort_by_key(|(code, _)| *code);
    all
}
