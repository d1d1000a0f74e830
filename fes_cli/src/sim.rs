//! Scripted two-node session on simulated hardware.
//!
//! Both nodes share one `ManualClock` and are stepped in lockstep 1 ms ticks,
//! gateway first. The script plays the phone and the patient: it connects,
//! confirms the parameters, registers the body weight, captures the MESE,
//! presses the trigger, stands, and finally unloads the scale until the
//! session stops.

use std::sync::Arc;

use fes_core::{
    GatewayCfg, GatewayHardware, GatewayNode, SessionPhase, StimulatorCfg, StimulatorNode,
    StimulatorState,
};
use fes_hardware::{
    MemoryStore, PhoneHandle, PulseCounter, ScaleHandle, SimBus, SimScale, SimTrigger, SimWireless,
};
use fes_protocol::ControlCode;
use fes_traits::ManualClock;
use serde_json::json;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub body_weight: u8,
    pub mese_steps: u8,
    pub max_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimSummary {
    /// Gateway phases in the order they were entered
    pub phases: Vec<SessionPhase>,
    pub peak_width: u16,
    pub mese: u16,
    pub mese_max: u16,
    pub pulses: u64,
    pub restarts: u32,
    pub final_phase: Option<SessionPhase>,
    pub final_state: Option<StimulatorState>,
    pub elapsed_ms: u64,
}

impl SimSummary {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "phases": self.phases.iter().map(|p| format!("{p:?}")).collect::<Vec<_>>(),
            "peak_width_us": self.peak_width,
            "mese": self.mese,
            "mese_max": self.mese_max,
            "pulses": self.pulses,
            "restarts": self.restarts,
            "final_phase": self.final_phase.map(|p| format!("{p:?}")),
            "final_stimulator_state": self.final_state.map(|s| format!("{s:?}")),
            "elapsed_ms": self.elapsed_ms,
        })
    }

    pub fn render_text(&self) -> String {
        let phases = self
            .phases
            .iter()
            .map(|p| format!("{p:?}"))
            .collect::<Vec<_>>()
            .join(" -> ");
        let phase = self
            .final_phase
            .map_or_else(|| "-".to_string(), |p| format!("{p:?}"));
        let state = self
            .final_state
            .map_or_else(|| "-".to_string(), |s| format!("{s:?}"));
        format!(
            "session complete in {} ms\nphases: {phases}\npeak width: {} us (MESE {}, MESE_max {})\npulses: {}\nrestarts: {}\nfinal: gateway {phase}, stimulator {state}",
            self.elapsed_ms, self.peak_width, self.mese, self.mese_max, self.pulses, self.restarts
        )
    }
}

struct Rig {
    gateway: GatewayNode,
    stimulator: StimulatorNode,
    clock: ManualClock,
    phone: PhoneHandle,
    scale: ScaleHandle,
    trigger: SimTrigger,
    pulses: PulseCounter,
    elapsed_ms: u64,
    budget_ms: u64,
    summary: SimSummary,
}

impl Rig {
    fn new(
        gateway_cfg: GatewayCfg,
        stimulator_cfg: StimulatorCfg,
        budget_ms: u64,
    ) -> eyre::Result<Self> {
        let (gw_bus, stim_bus) = SimBus::pair(1024);
        let clock = ManualClock::new();
        let scale = SimScale::new();
        let wireless = SimWireless::new();
        let trigger = SimTrigger::new();
        let pulses = PulseCounter::new();
        let scale_handle = scale.handle();
        let phone = wireless.phone();
        let gateway = GatewayNode::new(
            GatewayHardware {
                bus: Box::new(gw_bus),
                wireless: Box::new(wireless),
                scale: Box::new(scale),
                trigger: Box::new(trigger.clone()),
                store: Box::new(MemoryStore::new()),
            },
            Arc::new(clock.clone()),
            gateway_cfg,
        )?;
        let stimulator = StimulatorNode::new(
            Box::new(stim_bus),
            Box::new(pulses.clone()),
            Arc::new(clock.clone()),
            stimulator_cfg,
        )?;
        let summary = SimSummary {
            phases: gateway.phase().into_iter().collect(),
            peak_width: 0,
            mese: 0,
            mese_max: 0,
            pulses: 0,
            restarts: 0,
            final_phase: None,
            final_state: None,
            elapsed_ms: 0,
        };
        Ok(Self {
            gateway,
            stimulator,
            clock,
            phone,
            scale: scale_handle,
            trigger,
            pulses,
            elapsed_ms: 0,
            budget_ms,
            summary,
        })
    }

    fn phase(&self) -> Option<SessionPhase> {
        self.gateway.phase()
    }

    fn tick(&mut self) -> eyre::Result<()> {
        if self.elapsed_ms >= self.budget_ms {
            eyre::bail!(
                "simulation budget of {} ms exhausted in {:?}",
                self.budget_ms,
                self.phase()
            );
        }
        self.clock.advance_ms(1);
        self.elapsed_ms += 1;
        self.gateway.step()?;
        self.stimulator.step()?;

        let s = &mut self.summary;
        if let Some(phase) = self.gateway.phase()
            && s.phases.last() != Some(&phase)
        {
            debug!(?phase, at_ms = self.elapsed_ms, "phase reached");
            s.phases.push(phase);
        }
        s.peak_width = s.peak_width.max(self.stimulator.resolved_width());
        if self.gateway.phase().is_some_and(SessionPhase::is_operation) {
            let t = self.gateway.telemetry();
            s.mese = t.mese;
            s.mese_max = t.mese_max;
        }
        Ok(())
    }

    fn run_ms(&mut self, ms: u64) -> eyre::Result<()> {
        for _ in 0..ms {
            self.tick()?;
        }
        Ok(())
    }

    /// Tick until the gateway is in `phase`.
    fn reach(&mut self, phase: SessionPhase) -> eyre::Result<()> {
        while self.phase() != Some(phase) {
            self.tick()?;
        }
        info!(?phase, at_ms = self.elapsed_ms, "script checkpoint");
        Ok(())
    }

    fn control(&self, code: ControlCode, payload: u8) {
        self.phone.write([code as u8, payload]);
    }

    fn finish(mut self) -> SimSummary {
        self.summary.pulses = self.pulses.pulses();
        self.summary.restarts = self.gateway.restarts() + self.stimulator.restarts();
        self.summary.final_phase = self.gateway.phase();
        self.summary.final_state = self.stimulator.state();
        self.summary.elapsed_ms = self.elapsed_ms;
        self.summary
    }
}

/// Play one full session and report what happened.
pub fn run_session(
    script: Script,
    gateway_cfg: GatewayCfg,
    stimulator_cfg: StimulatorCfg,
) -> eyre::Result<SimSummary> {
    let class_size = i32::from(gateway_cfg.weight_class_size);
    let mut rig = Rig::new(gateway_cfg, stimulator_cfg, script.max_ms)?;
    let half = (i32::from(script.body_weight) + 1) / 2;

    rig.phone.connect();
    rig.reach(SessionPhase::ParameterSetup)?;
    rig.control(ControlCode::SetupComplete, 0);
    rig.reach(SessionPhase::ParallelWeight)?;
    rig.control(ControlCode::WeightSetFromArgument, script.body_weight);
    rig.control(ControlCode::WeightComplete, 0);
    rig.reach(SessionPhase::IntensityCapture)?;
    for _ in 0..script.mese_steps {
        rig.control(ControlCode::IntensityIncreaseOnce, 0);
    }
    rig.control(ControlCode::IntensityRegister, 0);
    rig.run_ms(1)?;
    rig.control(ControlCode::IntensityComplete, 0);
    rig.reach(SessionPhase::OperationStart)?;

    // load both cells past the start threshold and let the capture width
    // drain before pressing the trigger
    rig.scale.set(half, half);
    rig.run_ms(100)?;
    rig.trigger.set(true);
    rig.reach(SessionPhase::OperationGradualIncrease)?;
    rig.trigger.set(false);
    rig.reach(SessionPhase::OperationTransition)?;

    // stance: the scale sees less than one weight class
    rig.scale.set(class_size / 3, class_size / 3);
    rig.reach(SessionPhase::OperationClosedLoop)?;
    rig.run_ms(500)?;

    // unloading: the weight on the scale exceeds the setpoint
    rig.scale.set(half + 5, half);
    rig.reach(SessionPhase::OperationStop)?;
    rig.phone.disconnect();
    rig.reach(SessionPhase::Disconnected)?;
    rig.run_ms(50)?;

    Ok(rig.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> Script {
        Script {
            body_weight: 60,
            mese_steps: 3,
            max_ms: 60_000,
        }
    }

    #[test]
    fn default_session_visits_every_phase_in_order() {
        let s = run_session(script(), GatewayCfg::default(), StimulatorCfg::default()).unwrap();
        let mut expected = SessionPhase::ALL.to_vec();
        expected.push(SessionPhase::Disconnected);
        assert_eq!(s.phases, expected);
        assert_eq!(s.mese, 15);
        assert_eq!(s.mese_max, 18);
        assert!((15..=18).contains(&s.peak_width));
        assert_eq!(s.final_phase, Some(SessionPhase::Disconnected));
        assert_eq!(s.final_state, Some(StimulatorState::OpenLoop));
        assert_eq!(s.restarts, 0);
        assert!(s.pulses > 0);
    }

    #[test]
    fn tiny_budget_reports_where_it_stalled() {
        let err = run_session(
            Script {
                max_ms: 200,
                ..script()
            },
            GatewayCfg::default(),
            StimulatorCfg::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("budget of 200 ms exhausted"));
    }

    #[test]
    fn json_summary_names_phases() {
        let s = run_session(script(), GatewayCfg::default(), StimulatorCfg::default()).unwrap();
        let v = s.to_json();
        assert_eq!(v["phases"][0], "Disconnected");
        assert_eq!(v["final_stimulator_state"], "OpenLoop");
        assert!(s.render_text().starts_with("session complete in"));
    }
}
