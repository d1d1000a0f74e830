//! `From` implementations bridging `fes_config` types to `fes_core` types.

use fes_protocol::GainCoefficient;

use crate::config::{GatewayCfg, StimulatorCfg};
use crate::telemetry::SessionParams;

// ── StimulatorCfg ────────────────────────────────────────────────────────────

impl From<&fes_config::StimulatorCfg> for StimulatorCfg {
    fn from(c: &fes_config::StimulatorCfg) -> Self {
        Self {
            bus_timeout_ms: c.bus_timeout_ms,
            feedback_period_ms: c.feedback_period_ms,
            failsafe_decay_interval_ms: c.failsafe_decay_interval_ms,
            failsafe_decay_step: c.failsafe_decay_step,
            pulse_rate_hz: c.pulse_rate_hz,
            min_active_width: c.min_active_width,
        }
    }
}

// ── SessionParams ────────────────────────────────────────────────────────────

impl From<&fes_config::SessionDefaults> for SessionParams {
    fn from(c: &fes_config::SessionDefaults) -> Self {
        Self {
            ramp_up_interval_ms: c.ramp_up_interval_ms.max(1),
            ramp_up_step: c.ramp_up_step.clamp(1, 255) as u8,
            transition_ms: c.transition_ms.max(1),
            ramp_down_interval_ms: c.ramp_down_interval_ms.max(1),
            ramp_down_step: c.ramp_down_step.clamp(1, 255) as u8,
            hold_ms: c.hold_ms.max(1),
            gain: GainCoefficient::from_percent(c.gain),
        }
    }
}

// ── GatewayCfg ───────────────────────────────────────────────────────────────

impl From<&fes_config::Config> for GatewayCfg {
    fn from(c: &fes_config::Config) -> Self {
        let g = &c.gateway;
        Self {
            bus_period_ms: g.bus_period_ms,
            status_period_ms: g.status_period_ms,
            weight_class_size: g.weight_class_size,
            capture_step: g.capture_step,
            capture_max: g.capture_max,
            winding_down_step: g.winding_down_step,
            winding_down_interval_ms: g.winding_down_interval_ms,
            ceiling_step: g.ceiling_step,
            ceiling_percent: g.ceiling_percent,
            start_weight_percent: g.start_weight_percent,
            scale_timeout_ms: g.scale_timeout_ms,
            param_defaults: (&c.session).into(),
        }
    }
}
