//! Typed TOML configuration for both nodes and the parameter file store.
//!
//! Every section is optional; a missing section or key takes the default the
//! firmware ships with.

use serde::Deserialize;

pub mod store;

pub use store::FileStore;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StimulatorCfg {
    /// Bus silence that forces Failsafe
    pub bus_timeout_ms: u64,
    /// Interval between pulse-width feedback messages
    pub feedback_period_ms: u64,
    /// Failsafe decays the width once per interval
    pub failsafe_decay_interval_ms: u64,
    /// Width lost per failsafe interval
    pub failsafe_decay_step: u16,
    /// Nominal biphasic pulse rate
    pub pulse_rate_hz: u32,
    /// Requested widths below this are treated as 0
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayCfg {
    /// Period of the outbound bus burst
    pub bus_period_ms: u64,
    /// Period of status records to the phone
    pub status_period_ms: u64,
    /// Kilograms per weight class
    pub weight_class_size: u16,
    /// Candidate intensity change per increase/decrease command
    pub capture_step: u16,
    /// Upper bound for the candidate intensity
    pub capture_max: u16,
    pub winding_down_step: u16,
    pub winding_down_interval_ms: u64,
    /// MESE_max change per ceiling command
    pub ceiling_step: u16,
    /// MESE_max as a percentage of MESE when an operation starts
    pub ceiling_percent: u16,
    /// Share of the target weight that must be on the scale to start ramping
    pub start_weight_percent: u16,
    pub scale_timeout_ms: u64,
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
        }
    }
}

/// Defaults for the persisted session parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionDefaults {
    pub ramp_up_interval_ms: u16,
    pub ramp_up_step: u16,
    pub transition_ms: u16,
    pub ramp_down_interval_ms: u16,
    pub ramp_down_step: u16,
    pub hold_ms: u16,
    /// Closed-loop gain in percent (0..=100)
    pub gain: u16,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            ramp_up_interval_ms: 100,
            ramp_up_step: 1,
            transition_ms: 5000,
            ramp_down_interval_ms: 50,
            ramp_down_step: 1,
            hold_ms: 2000,
            gain: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreCfg {
    /// Parameter file (TOML)
    pub path: String,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            path: "fes_params.toml".to_string(),
        }
    }
}

/// BCM pin numbers of the two electrode channel pairs.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PinsCfg {
    pub pair_a: [u8; 2],
    pub pair_b: [u8; 2],
}

impl Default for PinsCfg {
    fn default() -> Self {
        Self {
            pair_a: [17, 27],
            pair_b: [22, 23],
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub stimulator: StimulatorCfg,
    pub gateway: GatewayCfg,
    pub session: SessionDefaults,
    pub store: StoreCfg,
    pub pins: PinsCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Stimulator
        let s = &self.stimulator;
        if s.bus_timeout_ms == 0 {
            eyre::bail!("stimulator.bus_timeout_ms must be >= 1");
        }
        if s.feedback_period_ms == 0 {
            eyre::bail!("stimulator.feedback_period_ms must be >= 1");
        }
        if s.feedback_period_ms >= s.bus_timeout_ms {
            eyre::bail!("stimulator.feedback_period_ms must be < bus_timeout_ms");
        }
        if s.failsafe_decay_interval_ms == 0 {
            eyre::bail!("stimulator.failsafe_decay_interval_ms must be >= 1");
        }
        if s.failsafe_decay_step == 0 {
            eyre::bail!("stimulator.failsafe_decay_step must be >= 1");
        }
        if s.pulse_rate_hz == 0 || s.pulse_rate_hz > 1000 {
            eyre::bail!("stimulator.pulse_rate_hz must be in 1..=1000");
        }

        // Gateway
        let g = &self.gateway;
        if g.bus_period_ms == 0 {
            eyre::bail!("gateway.bus_period_ms must be >= 1");
        }
        if g.bus_period_ms >= s.bus_timeout_ms {
            eyre::bail!("gateway.bus_period_ms must be < stimulator.bus_timeout_ms");
        }
        if g.status_period_ms == 0 {
            eyre::bail!("gateway.status_period_ms must be >= 1");
        }
        if g.weight_class_size == 0 {
            eyre::bail!("gateway.weight_class_size must be >= 1");
        }
        if g.capture_step == 0 || g.winding_down_step == 0 || g.ceiling_step == 0 {
            eyre::bail!("gateway step sizes must be >= 1");
        }
        if g.winding_down_interval_ms == 0 {
            eyre::bail!("gateway.winding_down_interval_ms must be >= 1");
        }
        if g.ceiling_percent < 100 {
            eyre::bail!("gateway.ceiling_percent must be >= 100");
        }
        if g.start_weight_percent > 100 {
            eyre::bail!("gateway.start_weight_percent must be <= 100");
        }
        if g.scale_timeout_ms == 0 {
            eyre::bail!("gateway.scale_timeout_ms must be >= 1");
        }

        // Session defaults
        let d = &self.session;
        if d.ramp_up_interval_ms == 0 || d.ramp_down_interval_ms == 0 {
            eyre::bail!("session ramp intervals must be >= 1");
        }
        if d.ramp_up_step == 0 || d.ramp_down_step == 0 {
            eyre::bail!("session ramp steps must be >= 1");
        }
        if d.ramp_up_step > 255 || d.ramp_down_step > 255 {
            eyre::bail!("session ramp steps must be <= 255");
        }
        if d.transition_ms == 0 || d.hold_ms == 0 {
            eyre::bail!("session durations must be >= 1");
        }
        if d.gain > 100 {
            eyre::bail!("session.gain must be in 0..=100");
        }

        // Store
        if self.store.path.trim().is_empty() {
            eyre::bail!("store.path must not be empty");
        }

        // Pins
        let p = &self.pins;
        let all = [p.pair_a[0], p.pair_a[1], p.pair_b[0], p.pair_b[1]];
        if all.iter().any(|&pin| pin > 27) {
            eyre::bail!("pins must be BCM numbers in 0..=27");
        }
        if all
            .iter()
            .enumerate()
            .any(|(i, pin)| all[i + 1..].contains(pin))
        {
            eyre::bail!("pins must be distinct");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }
        Ok(())
    }
}
