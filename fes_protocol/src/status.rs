//! Packed status record published to the phone.
//!
//! Layout (little-endian, 30 bytes):
//!
//! | offset | field |
//! |---|---|
//! | 0 | pulse-width feedback u16 |
//! | 2 | left weight u8 |
//! | 3 | right weight u8 |
//! | 4 | body weight u16 |
//! | 6 | MESE u16 |
//! | 8 | MESE_max u16 |
//! | 10 | setpoint u16 |
//! | 12 | flags u8 |
//! | 13 | session parameters echo, 11 bytes |
//! | 24 | phase telemetry, 6 bytes |

use crate::error::{ProtocolError, Result};

pub const STATUS_RECORD_LEN: usize = 30;
pub const PARAMS_ECHO_LEN: usize = 11;
pub const PHASE_TELEMETRY_LEN: usize = 6;

const PARAMS_OFFSET: usize = 13;
const PHASE_OFFSET: usize = PARAMS_OFFSET + PARAMS_ECHO_LEN;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags(u8);

impl StatusFlags {
    pub const TRIGGER_ASSERTED: u8 = 0b0000_0001;
    pub const BUS_AVAILABLE: u8 = 0b0000_0010;

    pub fn new(trigger_asserted: bool, bus_available: bool) -> Self {
        let mut bits = 0;
        if trigger_asserted {
            bits |= Self::TRIGGER_ASSERTED;
        }
        if bus_available {
            bits |= Self::BUS_AVAILABLE;
        }
        Self(bits)
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn trigger_asserted(self) -> bool {
        self.0 & Self::TRIGGER_ASSERTED != 0
    }

    pub fn bus_available(self) -> bool {
        self.0 & Self::BUS_AVAILABLE != 0
    }
}

/// Echo of the persisted session parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionParamsEcho {
    pub ramp_up_interval_ms: u16,
    pub ramp_up_step: u8,
    pub transition_ms: u16,
    pub ramp_down_interval_ms: u16,
    pub ramp_down_step: u8,
    pub hold_ms: u16,
    pub gain_percent: u8,
}

impl SessionParamsEcho {
    fn write(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.ramp_up_interval_ms.to_le_bytes());
        out[2] = self.ramp_up_step;
        out[3..5].copy_from_slice(&self.transition_ms.to_le_bytes());
        out[5..7].copy_from_slice(&self.ramp_down_interval_ms.to_le_bytes());
        out[7] = self.ramp_down_step;
        out[8..10].copy_from_slice(&self.hold_ms.to_le_bytes());
        out[10] = self.gain_percent;
    }

    fn read(b: &[u8]) -> Self {
        Self {
            ramp_up_interval_ms: u16::from_le_bytes([b[0], b[1]]),
            ramp_up_step: b[2],
            transition_ms: u16::from_le_bytes([b[3], b[4]]),
            ramp_down_interval_ms: u16::from_le_bytes([b[5], b[6]]),
            ramp_down_step: b[7],
            hold_ms: u16::from_le_bytes([b[8], b[9]]),
            gain_percent: b[10],
        }
    }
}

/// Six-byte diagnostic block: phase id followed by phase-specific values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTelemetry([u8; PHASE_TELEMETRY_LEN]);

impl PhaseTelemetry {
    pub fn new(phase_id: u8) -> Self {
        let mut bytes = [0u8; PHASE_TELEMETRY_LEN];
        bytes[0] = phase_id;
        Self(bytes)
    }

    pub fn phase_id(&self) -> u8 {
        self.0[0]
    }

    pub fn set_phase_id(&mut self, phase_id: u8) {
        self.0[0] = phase_id;
    }

    /// Write `value` at `offset` (1..=5); out-of-range offsets are ignored.
    pub fn put_u8(&mut self, offset: usize, value: u8) -> &mut Self {
        if (1..PHASE_TELEMETRY_LEN).contains(&offset) {
            self.0[offset] = value;
        }
        self
    }

    /// Little-endian u16 at `offset` (1..=4).
    pub fn put_u16(&mut self, offset: usize, value: u16) -> &mut Self {
        if (1..PHASE_TELEMETRY_LEN - 1).contains(&offset) {
            self.0[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        }
        self
    }

    pub fn put_i16(&mut self, offset: usize, value: i16) -> &mut Self {
        self.put_u16(offset, value as u16)
    }

    pub fn bytes(&self) -> [u8; PHASE_TELEMETRY_LEN] {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusRecord {
    pub pulse_width_feedback: u16,
    pub weight_left: u8,
    pub weight_right: u8,
    pub body_weight: u16,
    pub mese: u16,
    pub mese_max: u16,
    pub setpoint: u16,
    pub flags: StatusFlags,
    pub params: SessionParamsEcho,
    pub phase: PhaseTelemetry,
}

impl StatusRecord {
    pub fn encode(&self) -> [u8; STATUS_RECORD_LEN] {
        let mut out = [0u8; STATUS_RECORD_LEN];
        out[0..2].copy_from_slice(&self.pulse_width_feedback.to_le_bytes());
        out[2] = self.weight_left;
        out[3] = self.weight_right;
        out[4..6].copy_from_slice(&self.body_weight.to_le_bytes());
        out[6..8].copy_from_slice(&self.mese.to_le_bytes());
        out[8..10].copy_from_slice(&self.mese_max.to_le_bytes());
        out[10..12].copy_from_slice(&self.setpoint.to_le_bytes());
        out[12] = self.flags.bits();
        self.params
            .write(&mut out[PARAMS_OFFSET..PARAMS_OFFSET + PARAMS_ECHO_LEN]);
        out[PHASE_OFFSET..].copy_from_slice(&self.phase.bytes());
        out
    }

    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < STATUS_RECORD_LEN {
            return Err(ProtocolError::ShortRecord {
                expected: STATUS_RECORD_LEN,
                got: b.len(),
            });
        }
        let mut phase = [0u8; PHASE_TELEMETRY_LEN];
        phase.copy_from_slice(&b[PHASE_OFFSET..STATUS_RECORD_LEN]);
        Ok(Self {
            pulse_width_feedback: u16::from_le_bytes([b[0], b[1]]),
            weight_left: b[2],
            weight_right: b[3],
            body_weight: u16::from_le_bytes([b[4], b[5]]),
            mese: u16::from_le_bytes([b[6], b[7]]),
            mese_max: u16::from_le_bytes([b[8], b[9]]),
            setpoint: u16::from_le_bytes([b[10], b[11]]),
            flags: StatusFlags::from_bits(b[12]),
            params: SessionParamsEcho::read(&b[PARAMS_OFFSET..PHASE_OFFSET]),
            phase: PhaseTelemetry(phase),
        })
    }
}
