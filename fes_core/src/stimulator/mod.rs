//! Stimulator node: resolves a pulse width and drives the output stage.
//!
//! ## States
//!
//! - **OpenLoop**: width = last `SetRequestedPulseWidth`
//! - **ClosedLoop**: width from [`control_law::ClosedLoopLaw`]
//! - **Failsafe**: width decays to zero after bus loss or a peer reset
//!
//! Both working states fall into Failsafe after `bus_timeout_ms` of bus
//! silence and report the width they drive every `feedback_period_ms`.

pub mod control_law;
pub mod pulse;
pub mod states;

use std::sync::Arc;
use std::time::Instant;

use fes_protocol::Message;
use fes_traits::{Bus, Clock, PulsePort};
use tracing::{debug, info, warn};

use crate::config::StimulatorCfg;
use crate::error::Result;
use crate::fsm::StateMachine;
use crate::hw_error::map_hw_error;
use crate::status::{Node, StepOutcome};
use crate::telemetry::Telemetry;
use pulse::PulseGenerator;
use states::{ClosedLoop, Failsafe, OpenLoop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StimulatorState {
    OpenLoop,
    ClosedLoop,
    Failsafe,
}

/// Everything the stimulator states read and write.
pub struct StimulatorContext {
    pub telemetry: Telemetry,
    pub cfg: StimulatorCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    bus: Box<dyn Bus + Send>,
    pulse: PulseGenerator<Box<dyn PulsePort + Send>>,
    resolved_width: u16,
    peer_reset_seen: bool,
    restart_requested: bool,
}

impl StimulatorContext {
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    /// Width last handed to the pulse generator.
    pub fn resolved_width(&self) -> u16 {
        self.resolved_width
    }

    /// Record `width` as the resolved width and give the generator a chance to fire.
    pub fn drive(&mut self, width: u16) {
        self.resolved_width = width;
        self.telemetry.feedback_width = width;
        let now_us = self.clock.us_since(self.epoch);
        self.pulse.tick(width, now_us);
    }

    pub fn send(&mut self, msg: Message) {
        if let Err(e) = self.bus.send(msg.encode()) {
            warn!(kind = ?msg.kind, error = %map_hw_error(&*e), "bus send failed");
        }
    }

    pub fn request_restart(&mut self) {
        self.restart_requested = true;
    }

    /// Remember that Failsafe was entered because of a peer reset.
    pub fn note_peer_reset(&mut self) {
        self.peer_reset_seen = true;
    }

    pub fn take_peer_reset(&mut self) -> bool {
        std::mem::take(&mut self.peer_reset_seen)
    }

    fn take_restart(&mut self) -> bool {
        std::mem::take(&mut self.restart_requested)
    }

    /// Boot values: telemetry, width, pending flags and pulse timing.
    fn power_on(&mut self) {
        self.telemetry.reset();
        self.resolved_width = 0;
        self.peer_reset_seen = false;
        self.restart_requested = false;
        self.pulse.reset();
    }
}

fn build_machine() -> StateMachine<StimulatorState, StimulatorContext> {
    let mut m = StateMachine::new();
    m.register(StimulatorState::OpenLoop, OpenLoop::new())
        .register(StimulatorState::ClosedLoop, ClosedLoop::new())
        .register(StimulatorState::Failsafe, Failsafe::new());
    m
}

/// Top-level stimulator controller; owns the telemetry and the devices.
pub struct StimulatorNode {
    machine: StateMachine<StimulatorState, StimulatorContext>,
    ctx: StimulatorContext,
    restarts: u32,
}

impl StimulatorNode {
    pub fn new(
        bus: Box<dyn Bus + Send>,
        port: Box<dyn PulsePort + Send>,
        clock: Arc<dyn Clock + Send + Sync>,
        cfg: StimulatorCfg,
    ) -> Result<Self> {
        let epoch = clock.now();
        let pulse = PulseGenerator::new(port, cfg.pulse_rate_hz);
        let mut ctx = StimulatorContext {
            telemetry: Telemetry::new(),
            cfg,
            clock,
            epoch,
            bus,
            pulse,
            resolved_width: 0,
            peer_reset_seen: false,
            restart_requested: false,
        };
        let mut machine = build_machine();
        machine.setup(StimulatorState::OpenLoop, &mut ctx)?;
        Ok(Self {
            machine,
            ctx,
            restarts: 0,
        })
    }

    pub fn state(&self) -> Option<StimulatorState> {
        self.machine.current()
    }

    pub fn resolved_width(&self) -> u16 {
        self.ctx.resolved_width
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.ctx.telemetry
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// One cooperative iteration: drain the bus, then run the state loop.
    pub fn step(&mut self) -> Result<StepOutcome> {
        loop {
            let frame = match self.ctx.bus.try_recv() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %map_hw_error(&*e), "bus receive failed");
                    break;
                }
            };
            match Message::decode(&frame) {
                Ok(msg) => self.machine.dispatch_message(&msg, &mut self.ctx)?,
                Err(e) => debug!(error = %e, id = frame.id, "ignoring bus frame"),
            }
            if self.ctx.take_restart() {
                self.restart()?;
                return Ok(StepOutcome::Restarted);
            }
        }

        self.machine.run_loop(&mut self.ctx)?;
        if self.ctx.take_restart() {
            self.restart()?;
            return Ok(StepOutcome::Restarted);
        }
        Ok(StepOutcome::Running)
    }

    fn restart(&mut self) -> Result<()> {
        self.restarts += 1;
        info!(restarts = self.restarts, "stimulator restarting");
        self.ctx.power_on();
        self.machine = build_machine();
        self.machine.setup(StimulatorState::OpenLoop, &mut self.ctx)
    }
}

impl Node for StimulatorNode {
    fn name(&self) -> &'static str {
        "stimulator"
    }

    fn step(&mut self) -> Result<StepOutcome> {
        StimulatorNode::step(self)
    }
}
