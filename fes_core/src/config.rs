//! Runtime configuration of the two node controllers.

use crate::telemetry::SessionParams;

#[derive(Debug, Clone)]
pub struct StimulatorCfg {
    pub bus_timeout_ms: u64,
    pub feedback_period_ms: u64,
    pub failsafe_decay_interval_ms: u64,
    pub failsafe_decay_step: u16,
    pub pulse_rate_hz: u32,
    pub min_active_width: u16,
}

impl Default for StimulatorCfg {
    fn default() -> Self {
        Self {
            bus_timeout_ms: 1000,
            feedback_period_ms: 5,
            failsafe_decay_interval_ms: 50,
            failsafe_decay_step: 1,
            pulse_rate_hz: 35,
            min_active_width: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayCfg {
    pub bus_period_ms: u64,
    pub status_period_ms: u64,
    pub weight_class_size: u16,
    pub capture_step: u16,
    pub capture_max: u16,
    pub winding_down_step: u16,
    pub winding_down_interval_ms: u64,
    pub ceiling_step: u16,
    pub ceiling_percent: u16,
    pub start_weight_percent: u16,
    pub scale_timeout_ms: u64,
    /// Used when the store has no value for a parameter.
    pub param_defaults: SessionParams,
}

impl Default for GatewayCfg {
    fn default() -> Self {
        Self {
            bus_period_ms: 15,
            status_period_ms: 120,
            weight_class_size: 10,
            capture_step: 5,
            capture_max: 255,
            winding_down_step: 5,
            winding_down_interval_ms: 200,
            ceiling_step: 5,
            ceiling_percent: 120,
            start_weight_percent: 20,
            scale_timeout_ms: 50,
            param_defaults: SessionParams::default(),
        }
    }
}
