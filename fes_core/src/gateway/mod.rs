//! Gateway node: sequences a therapy session and feeds the stimulator.
//!
//! ## Phases
//!
//! ```text
//! Disconnected -> ParameterSetup -> ParallelWeight -> IntensityCapture
//!   -> OperationStart -> OperationGradualIncrease -> OperationTransition
//!   -> OperationClosedLoop -> OperationStop -> Disconnected
//! ```
//!
//! Every phase publishes a burst of bus messages each `bus_period_ms`.
//! Losing the phone outside the operation phases drops back to
//! Disconnected; during operation it goes to OperationStop so the width is
//! ramped down instead of cut.

pub mod capture;
pub mod operation;
pub mod params;
pub mod ramp;
pub mod setup;
pub mod weight_class;

use std::sync::Arc;
use std::time::{Duration, Instant};

use fes_protocol::{ControlCode, ControlCommand, LoopMode, Message, MessageKind, PhaseTelemetry};
use fes_traits::{Bus, Clock, ParamStore, Scale, TriggerInput, Wireless};
use tracing::{debug, info, warn};

use crate::config::GatewayCfg;
use crate::error::Result;
use crate::fsm::StateMachine;
use crate::hw_error::map_hw_error;
use crate::status::{Node, StepOutcome};
use crate::telemetry::Telemetry;
use crate::util::Interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionPhase {
    Disconnected = 0,
    ParameterSetup = 1,
    ParallelWeight = 2,
    IntensityCapture = 3,
    OperationStart = 4,
    OperationGradualIncrease = 5,
    OperationTransition = 6,
    OperationClosedLoop = 7,
    OperationStop = 8,
}

impl SessionPhase {
    pub const ALL: [SessionPhase; 9] = [
        SessionPhase::Disconnected,
        SessionPhase::ParameterSetup,
        SessionPhase::ParallelWeight,
        SessionPhase::IntensityCapture,
        SessionPhase::OperationStart,
        SessionPhase::OperationGradualIncrease,
        SessionPhase::OperationTransition,
        SessionPhase::OperationClosedLoop,
        SessionPhase::OperationStop,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    pub fn is_operation(self) -> bool {
        self >= SessionPhase::OperationStart
    }
}

/// Devices owned by the gateway.
pub struct GatewayHardware {
    pub bus: Box<dyn Bus + Send>,
    pub wireless: Box<dyn Wireless + Send>,
    pub scale: Box<dyn Scale + Send>,
    pub trigger: Box<dyn TriggerInput + Send>,
    pub store: Box<dyn ParamStore + Send>,
}

/// Content of one outbound burst beyond the always-present weight total and gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    pub requested: Option<u16>,
    pub residual: bool,
    /// When false, setpoint and both intensity limits go out as 0.
    pub limits: bool,
    pub mode: LoopMode,
}

impl Burst {
    /// Outside operation: nothing to stimulate.
    pub fn idle() -> Self {
        Self {
            requested: Some(0),
            residual: false,
            limits: false,
            mode: LoopMode::Open,
        }
    }

    pub fn open(requested: u16) -> Self {
        Self {
            requested: Some(requested),
            residual: false,
            limits: true,
            mode: LoopMode::Open,
        }
    }

    pub fn closed() -> Self {
        Self {
            requested: None,
            residual: true,
            limits: true,
            mode: LoopMode::Closed,
        }
    }

    /// Messages in send order; the mode flag is always last.
    pub fn messages(&self, t: &Telemetry) -> Vec<Message> {
        let mut out = Vec::with_capacity(8);
        if let Some(w) = self.requested {
            out.push(Message::new(MessageKind::SetRequestedPulseWidth, w));
        }
        if self.residual {
            out.push(Message::new(MessageKind::ResidualWeightTotal, t.residual_weight));
        }
        out.push(Message::new(MessageKind::WeightTotal, t.measured_total()));
        let (setpoint, mese, mese_max) = if self.limits {
            (t.setpoint, t.mese, t.mese_max)
        } else {
            (0, 0, 0)
        };
        out.push(Message::new(MessageKind::Setpoint, setpoint));
        out.push(Message::new(MessageKind::IntensityFloor, mese));
        out.push(Message::new(MessageKind::IntensityCeiling, mese_max));
        out.push(Message::gain(t.params.gain));
        out.push(Message::mode(self.mode));
        out
    }
}

/// Everything the gateway phases read and write.
pub struct GatewayContext {
    pub telemetry: Telemetry,
    pub cfg: GatewayCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    bus: Box<dyn Bus + Send>,
    store: Box<dyn ParamStore + Send>,
    link_up: bool,
    burst: Interval,
    restart_requested: bool,
}

impl GatewayContext {
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    /// Phone connected as of the start of this iteration.
    pub fn link_up(&self) -> bool {
        self.link_up
    }

    pub fn total_weight(&self) -> u16 {
        self.telemetry.measured_total()
    }

    /// Mirror `phase` into the telemetry block, clearing phase-specific bytes.
    pub fn enter_phase(&mut self, phase: SessionPhase) {
        info!(phase = ?phase, "entering phase");
        self.telemetry.phase = PhaseTelemetry::new(phase.id());
    }

    pub fn phase_block(&mut self) -> &mut PhaseTelemetry {
        &mut self.telemetry.phase
    }

    pub fn store(&self) -> &dyn ParamStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn ParamStore {
        self.store.as_mut()
    }

    pub fn send(&mut self, msg: Message) {
        if let Err(e) = self.bus.send(msg.encode()) {
            warn!(kind = ?msg.kind, error = %map_hw_error(&*e), "bus send failed");
        }
    }

    /// Send `burst` if the bus period has elapsed. Returns whether it went out.
    pub fn publish(&mut self, burst: Burst) -> bool {
        let now = self.now_ms();
        if !self.burst.due(now) {
            return false;
        }
        for msg in burst.messages(&self.telemetry) {
            self.send(msg);
        }
        true
    }

    /// Ask the stimulator to restart, then restart this node.
    pub fn reset_firmware(&mut self) {
        warn!("firmware reset requested from phone");
        self.send(Message::new(MessageKind::PeerResetNotification, 0));
        self.restart_requested = true;
    }

    fn take_restart(&mut self) -> bool {
        std::mem::take(&mut self.restart_requested)
    }

    fn power_on(&mut self) {
        self.telemetry.reset();
        self.restart_requested = false;
        self.link_up = false;
        let now = self.now_ms();
        self.burst.restart(now);
        self.send(Message::new(MessageKind::PeerRestartedNotification, 0));
    }
}

fn build_machine() -> StateMachine<SessionPhase, GatewayContext> {
    let mut m = StateMachine::new();
    m.register(SessionPhase::Disconnected, setup::Disconnected::new())
        .register(SessionPhase::ParameterSetup, setup::ParameterSetup::new())
        .register(SessionPhase::ParallelWeight, capture::ParallelWeight::new())
        .register(SessionPhase::IntensityCapture, capture::IntensityCapture::new())
        .register(SessionPhase::OperationStart, operation::Start::new())
        .register(
            SessionPhase::OperationGradualIncrease,
            operation::GradualIncrease::new(),
        )
        .register(SessionPhase::OperationTransition, operation::Transition::new())
        .register(SessionPhase::OperationClosedLoop, operation::ClosedLoop::new())
        .register(SessionPhase::OperationStop, operation::Stop::new());
    m
}

/// Top-level gateway controller.
pub struct GatewayNode {
    machine: StateMachine<SessionPhase, GatewayContext>,
    ctx: GatewayContext,
    wireless: Box<dyn Wireless + Send>,
    scale: Box<dyn Scale + Send>,
    trigger: Box<dyn TriggerInput + Send>,
    status: Interval,
    restarts: u32,
}

impl GatewayNode {
    /// Announces the boot on the bus and starts in Disconnected.
    pub fn new(
        hw: GatewayHardware,
        clock: Arc<dyn Clock + Send + Sync>,
        cfg: GatewayCfg,
    ) -> Result<Self> {
        let epoch = clock.now();
        let burst = Interval::new(cfg.bus_period_ms, 0);
        let status = Interval::new(cfg.status_period_ms, 0);
        let mut telemetry = Telemetry::new();
        telemetry.params = cfg.param_defaults;
        let mut ctx = GatewayContext {
            telemetry,
            cfg,
            clock,
            epoch,
            bus: hw.bus,
            store: hw.store,
            link_up: false,
            burst,
            restart_requested: false,
        };
        ctx.power_on();
        let mut machine = build_machine();
        machine.setup(SessionPhase::Disconnected, &mut ctx)?;
        Ok(Self {
            machine,
            ctx,
            wireless: hw.wireless,
            scale: hw.scale,
            trigger: hw.trigger,
            status,
            restarts: 0,
        })
    }

    pub fn phase(&self) -> Option<SessionPhase> {
        self.machine.current()
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.ctx.telemetry
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// One cooperative iteration: sample inputs, drain the bus, handle phone
    /// writes, run the phase loop and publish status.
    pub fn step(&mut self) -> Result<StepOutcome> {
        self.sample_inputs();

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
                Ok(msg) => {
                    if msg.kind == MessageKind::PulseWidthFeedback {
                        self.ctx.telemetry.feedback_width = msg.payload;
                    }
                    self.machine.dispatch_message(&msg, &mut self.ctx)?;
                }
                Err(e) => debug!(error = %e, id = frame.id, "ignoring bus frame"),
            }
        }

        loop {
            let bytes = match self.wireless.poll_control() {
                Ok(Some(bytes)) => bytes,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %map_hw_error(&*e), "wireless poll failed");
                    break;
                }
            };
            let cmd = match ControlCommand::decode(bytes) {
                Ok(cmd) => cmd,
                Err(e) => {
                    debug!(error = %e, "ignoring control write");
                    continue;
                }
            };
            match cmd.code {
                ControlCode::KeepAlive => {}
                ControlCode::ResetFirmware => self.ctx.reset_firmware(),
                _ => self.machine.dispatch_control(&cmd, &mut self.ctx)?,
            }
            if self.ctx.take_restart() {
                self.restart()?;
                return Ok(StepOutcome::Restarted);
            }
        }

        self.machine.run_loop(&mut self.ctx)?;
        self.publish_status();
        Ok(StepOutcome::Running)
    }

    fn sample_inputs(&mut self) {
        let timeout = Duration::from_millis(self.ctx.cfg.scale_timeout_ms);
        match self.scale.read(timeout) {
            Ok((left, right)) => self.ctx.telemetry.set_weights(left, right),
            Err(e) => warn!(error = %map_hw_error(&*e), "scale read failed; keeping last weights"),
        }
        self.ctx.telemetry.trigger_asserted = self.trigger.is_asserted();
        self.ctx.telemetry.bus_available = self.ctx.bus.is_available();
        let up = self.wireless.is_connected();
        if up != self.ctx.link_up {
            info!(connected = up, "phone link changed");
        }
        self.ctx.link_up = up;
    }

    fn publish_status(&mut self) {
        if !self.ctx.link_up {
            return;
        }
        let now = self.ctx.now_ms();
        if !self.status.due(now) {
            return;
        }
        let record = self.ctx.telemetry.status_record();
        if let Err(e) = self.wireless.write_status(&record.encode()) {
            debug!(error = %map_hw_error(&*e), "status write failed");
        }
    }

    fn restart(&mut self) -> Result<()> {
        self.restarts += 1;
        info!(restarts = self.restarts, "gateway restarting");
        self.ctx.power_on();
        self.machine = build_machine();
        self.machine.setup(SessionPhase::Disconnected, &mut self.ctx)
    }
}

impl Node for GatewayNode {
    fn name(&self) -> &'static str {
        "gateway"
    }

    fn step(&mut self) -> Result<StepOutcome> {
        GatewayNode::step(self)
    }
}
