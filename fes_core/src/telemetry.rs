//! Per-node telemetry and the persisted session parameters.

use fes_protocol::{GainCoefficient, PhaseTelemetry, SessionParamsEcho, StatusFlags, StatusRecord};

use crate::util::clamp_u16;

/// Session parameters edited during ParameterSetup and kept in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub ramp_up_interval_ms: u16,
    pub ramp_up_step: u8,
    pub transition_ms: u16,
    pub ramp_down_interval_ms: u16,
    pub ramp_down_step: u8,
    /// How long the closed-loop error must stay non-negative before stopping
    pub hold_ms: u16,
    pub gain: GainCoefficient,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            ramp_up_interval_ms: 100,
            ramp_up_step: 1,
            transition_ms: 5000,
            ramp_down_interval_ms: 50,
            ramp_down_step: 1,
            hold_ms: 2000,
            gain: GainCoefficient::default(),
        }
    }
}

impl SessionParams {
    pub fn echo(&self) -> SessionParamsEcho {
        SessionParamsEcho {
            ramp_up_interval_ms: self.ramp_up_interval_ms,
            ramp_up_step: self.ramp_up_step,
            transition_ms: self.transition_ms,
            ramp_down_interval_ms: self.ramp_down_interval_ms,
            ramp_down_step: self.ramp_down_step,
            hold_ms: self.hold_ms,
            gain_percent: self.gain.percent(),
        }
    }
}

/// Everything one node knows about the session.
///
/// The stimulator fills the weight and limit fields from bus messages; the
/// gateway fills them from its sensors and the phone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Telemetry {
    pub weight_left: u16,
    pub weight_right: u16,
    /// Total weight as received over the bus (stimulator side)
    pub weight_total: u16,
    pub residual_weight: u16,
    /// Body weight captured during ParallelWeight
    pub body_weight: u16,
    pub requested_width: u16,
    pub feedback_width: u16,
    pub mese: u16,
    pub mese_max: u16,
    pub setpoint: u16,
    pub gain: GainCoefficient,
    pub params: SessionParams,
    pub trigger_asserted: bool,
    pub bus_available: bool,
    pub phase: PhaseTelemetry,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to boot values. Session parameters are kept; they are owned by the store.
    pub fn reset(&mut self) {
        let params = self.params;
        *self = Self {
            params,
            ..Self::default()
        };
    }

    /// Store both load-cell readings, clamped to >= 0.
    pub fn set_weights(&mut self, left: i32, right: i32) {
        self.weight_left = clamp_u16(i64::from(left));
        self.weight_right = clamp_u16(i64::from(right));
    }

    /// Sum of both sides as seen by the gateway.
    pub fn measured_total(&self) -> u16 {
        self.weight_left.saturating_add(self.weight_right)
    }

    pub fn status_record(&self) -> StatusRecord {
        StatusRecord {
            pulse_width_feedback: self.feedback_width,
            weight_left: self.weight_left.min(u16::from(u8::MAX)) as u8,
            weight_right: self.weight_right.min(u16::from(u8::MAX)) as u8,
            body_weight: self.body_weight,
            mese: self.mese,
            mese_max: self.mese_max,
            setpoint: self.setpoint,
            flags: StatusFlags::new(self.trigger_asserted, self.bus_available),
            params: self.params.echo(),
            phase: self.phase,
        }
    }
}
