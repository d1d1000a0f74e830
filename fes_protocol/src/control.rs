//! Control writes from the phone: `[code, payload]`.
//!
//! Codes are grouped by the session phase that accepts them; the high nibble
//! names the phase (0x1_ weight, 0x2_ intensity, 0x3_ operation, 0x6_ setup).

use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlCode {
    ResetFirmware = 0x00,
    KeepAlive = 0x01,

    WeightGoBack = 0x10,
    WeightRegister = 0x11,
    WeightSetFromArgument = 0x16,
    WeightComplete = 0x1F,

    IntensityGoBack = 0x20,
    IntensityIncreaseOnce = 0x21,
    IntensityDecreaseOnce = 0x22,
    IntensityRegister = 0x24,
    IntensityComplete = 0x2F,

    OperationGoBack = 0x30,
    OperationSetSetpoint = 0x31,
    OperationIncreaseCeilingOnce = 0x32,
    OperationDecreaseCeilingOnce = 0x33,
    OperationEmergencyStop = 0x38,

    SetupRampUpInterval = 0x61,
    SetupRampUpStep = 0x62,
    SetupTransitionDuration = 0x63,
    SetupRampDownInterval = 0x64,
    SetupRampDownStep = 0x65,
    SetupHoldDuration = 0x66,
    SetupGain = 0x67,
    SetupResetDefaults = 0x6D,
    SetupSave = 0x6E,
    SetupComplete = 0x6F,
}

impl ControlCode {
    pub const ALL: [ControlCode; 26] = [
        ControlCode::ResetFirmware,
        ControlCode::KeepAlive,
        ControlCode::WeightGoBack,
        ControlCode::WeightRegister,
        ControlCode::WeightSetFromArgument,
        ControlCode::WeightComplete,
        ControlCode::IntensityGoBack,
        ControlCode::IntensityIncreaseOnce,
        ControlCode::IntensityDecreaseOnce,
        ControlCode::IntensityRegister,
        ControlCode::IntensityComplete,
        ControlCode::OperationGoBack,
        ControlCode::OperationSetSetpoint,
        ControlCode::OperationIncreaseCeilingOnce,
        ControlCode::OperationDecreaseCeilingOnce,
        ControlCode::OperationEmergencyStop,
        ControlCode::SetupRampUpInterval,
        ControlCode::SetupRampUpStep,
        ControlCode::SetupTransitionDuration,
        ControlCode::SetupRampDownInterval,
        ControlCode::SetupRampDownStep,
        ControlCode::SetupHoldDuration,
        ControlCode::SetupGain,
        ControlCode::SetupResetDefaults,
        ControlCode::SetupSave,
        ControlCode::SetupComplete,
    ];
}

impl TryFrom<u8> for ControlCode {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self> {
        ControlCode::ALL
            .iter()
            .copied()
            .find(|c| *c as u8 == code)
            .ok_or(ProtocolError::UnknownControlCode(code))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlCommand {
    pub code: ControlCode,
    pub payload: u8,
}

impl ControlCommand {
    #[inline]
    pub fn new(code: ControlCode, payload: u8) -> Self {
        Self { code, payload }
    }

    pub fn decode(bytes: [u8; 2]) -> Result<Self> {
        Ok(Self {
            code: ControlCode::try_from(bytes[0])?,
            payload: bytes[1],
        })
    }

    pub fn encode(&self) -> [u8; 2] {
        [self.code as u8, self.payload]
    }
}
