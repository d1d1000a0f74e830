//! The five operation phases.
//!
//! Start waits for the trigger and some load, GradualIncrease ramps the
//! open-loop width to MESE, Transition waits for the leg to unload, ClosedLoop
//! hands control to the stimulator's law and Stop ramps back to zero.
//!
//! The open-loop width never exceeds MESE_max, so lowering the ceiling below
//! MESE also lowers what GradualIncrease and Transition command.

use fes_protocol::{ControlCode, ControlCommand};
use tracing::{info, warn};

use super::ramp::Ramp;
use super::weight_class::WeightClassTracker;
use super::{Burst, GatewayContext, SessionPhase};
use crate::fsm::{State, Transition as Next};
use crate::telemetry::Telemetry;
use crate::util::{ms_u16, scale_percent};

/// Controls shared by every operation phase.
fn operation_control(
    ctx: &mut GatewayContext,
    phase: SessionPhase,
    cmd: &ControlCommand,
) -> Next<SessionPhase> {
    let step = ctx.cfg.ceiling_step;
    let t = &mut ctx.telemetry;
    match cmd.code {
        ControlCode::OperationSetSetpoint => {
            t.setpoint = u16::from(cmd.payload);
            info!(setpoint = t.setpoint, "setpoint changed");
        }
        ControlCode::OperationIncreaseCeilingOnce => {
            t.mese_max = t.mese_max.saturating_add(step);
            info!(mese_max = t.mese_max, "ceiling raised");
        }
        ControlCode::OperationDecreaseCeilingOnce => {
            t.mese_max = t.mese_max.saturating_sub(step);
            info!(mese_max = t.mese_max, "ceiling lowered");
        }
        ControlCode::OperationEmergencyStop if phase != SessionPhase::OperationStop => {
            warn!(phase = ?phase, "emergency stop");
            return Next::To(SessionPhase::OperationStop);
        }
        ControlCode::OperationGoBack
            if matches!(
                phase,
                SessionPhase::OperationStart | SessionPhase::OperationStop
            ) =>
        {
            return Next::To(SessionPhase::IntensityCapture);
        }
        _ => {}
    }
    Next::Stay
}

/// Open-loop width held once the ramp is done: MESE, capped by the ceiling.
fn open_loop_width(t: &Telemetry) -> u16 {
    t.mese.min(t.mese_max)
}

/// Link loss in any running operation phase ramps down through Stop.
fn link_lost(ctx: &GatewayContext, phase: SessionPhase) -> bool {
    if ctx.link_up() {
        return false;
    }
    warn!(phase = ?phase, "phone lost during operation; stopping");
    true
}

// ── Start ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Start;

impl Start {
    pub fn new() -> Self {
        Self
    }

    /// Load needed on the scale before the ramp may begin.
    pub fn threshold(ctx: &GatewayContext) -> u16 {
        let target = ctx.telemetry.setpoint.saturating_mul(2);
        scale_percent(target, ctx.cfg.start_weight_percent)
    }
}

impl State<SessionPhase, GatewayContext> for Start {
    fn name(&self) -> &'static str {
        "OperationStart"
    }

    fn enter(&mut self, ctx: &mut GatewayContext) {
        ctx.enter_phase(SessionPhase::OperationStart);
        let t = &mut ctx.telemetry;
        t.mese_max = scale_percent(t.mese, ctx.cfg.ceiling_percent);
        t.setpoint = t.body_weight / 2;
        info!(
            mese = t.mese,
            mese_max = t.mese_max,
            setpoint = t.setpoint,
            "operation armed"
        );
    }

    fn on_loop(&mut self, ctx: &mut GatewayContext) -> Next<SessionPhase> {
        if link_lost(ctx, SessionPhase::OperationStart) {
            return Next::To(SessionPhase::OperationStop);
        }
        let threshold = Self::threshold(ctx);
        ctx.phase_block().put_u16(1, threshold);
        ctx.publish(Burst::open(0));
        if ctx.telemetry.trigger_asserted && ctx.total_weight() >= threshold {
            info!(weight = ctx.total_weight(), threshold, "trigger with load; ramping up");
            return Next::To(SessionPhase::OperationGradualIncrease);
        }
        Next::Stay
    }

    fn on_control(&mut self, ctx: &mut GatewayContext, cmd: &ControlCommand) -> Next<SessionPhase> {
        operation_control(ctx, SessionPhase::OperationStart, cmd)
    }
}

// ── GradualIncrease ──────────────────────────────────────────────────────────

/// Open-loop ramp from the current width up to MESE, or to MESE_max when the
/// ceiling is lower.
#[derive(Default)]
pub struct GradualIncrease {
    commanded: u16,
    ramp: Option<Ramp>,
}

impl GradualIncrease {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State<SessionPhase, GatewayContext> for GradualIncrease {
    fn name(&self) -> &'static str {
        "OperationGradualIncrease"
    }

    fn enter(&mut self, ctx: &mut GatewayContext) {
        ctx.enter_phase(SessionPhase::OperationGradualIncrease);
        let p = ctx.telemetry.params;
        self.commanded = ctx.telemetry.feedback_width;
        self.ramp = Some(Ramp::new(
            open_loop_width(&ctx.telemetry),
            u16::from(p.ramp_up_step),
            u64::from(p.ramp_up_interval_ms),
            ctx.now_ms(),
        ));
    }

    fn on_loop(&mut self, ctx: &mut GatewayContext) -> Next<SessionPhase> {
        if link_lost(ctx, SessionPhase::OperationGradualIncrease) {
            return Next::To(SessionPhase::OperationStop);
        }
        let now = ctx.now_ms();
        let target = open_loop_width(&ctx.telemetry);
        self.commanded = self.commanded.min(target);
        if let Some(ramp) = self.ramp.as_mut() {
            ramp.retarget(target);
            if let Some(next) = ramp.advance(self.commanded, now) {
                self.commanded = next;
            }
            ctx.telemetry.phase.put_u16(1, ms_u16(ramp.ms_since_step(now)));
        }
        ctx.telemetry.requested_width = self.commanded;
        ctx.publish(Burst::open(self.commanded));
        if ctx.telemetry.feedback_width >= target {
            return Next::To(SessionPhase::OperationTransition);
        }
        Next::Stay
    }

    fn on_control(&mut self, ctx: &mut GatewayContext, cmd: &ControlCommand) -> Next<SessionPhase> {
        operation_control(ctx, SessionPhase::OperationGradualIncrease, cmd)
    }

    fn exit(&mut self, _ctx: &mut GatewayContext) {
        self.ramp = None;
    }
}

// ── Transition ───────────────────────────────────────────────────────────────

/// Holds the open-loop width until the weight class settles at zero for `transition_ms`.
#[derive(Default)]
pub struct Transition {
    tracker: Option<WeightClassTracker>,
}

impl Transition {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State<SessionPhase, GatewayContext> for Transition {
    fn name(&self) -> &'static str {
        "OperationTransition"
    }

    fn enter(&mut self, ctx: &mut GatewayContext) {
        ctx.enter_phase(SessionPhase::OperationTransition);
        self.tracker = Some(WeightClassTracker::new(
            ctx.cfg.weight_class_size,
            ctx.total_weight(),
            ctx.now_ms(),
        ));
    }

    fn on_loop(&mut self, ctx: &mut GatewayContext) -> Next<SessionPhase> {
        if link_lost(ctx, SessionPhase::OperationTransition) {
            return Next::To(SessionPhase::OperationStop);
        }
        let now = ctx.now_ms();
        let total = ctx.total_weight();
        let hold = u64::from(ctx.telemetry.params.transition_ms);
        let Some(tracker) = self.tracker.as_mut() else {
            return Next::Stay;
        };
        let class = tracker.update(total, now);
        let stable = tracker.stable(0, hold, now);
        let held = ms_u16(tracker.held_ms(now));
        ctx.phase_block()
            .put_u16(1, held)
            .put_u8(3, u8::try_from(class).unwrap_or(u8::MAX));
        let width = open_loop_width(&ctx.telemetry);
        ctx.telemetry.requested_width = width;
        ctx.publish(Burst::open(width));
        if stable {
            return Next::To(SessionPhase::OperationClosedLoop);
        }
        Next::Stay
    }

    fn on_control(&mut self, ctx: &mut GatewayContext, cmd: &ControlCommand) -> Next<SessionPhase> {
        operation_control(ctx, SessionPhase::OperationTransition, cmd)
    }

    fn exit(&mut self, ctx: &mut GatewayContext) {
        self.tracker = None;
        ctx.telemetry.residual_weight = ctx.total_weight();
        info!(residual = ctx.telemetry.residual_weight, "residual weight captured");
    }
}

// ── ClosedLoop ───────────────────────────────────────────────────────────────

/// Stimulator runs its law; the gateway watches `weight - 2 * setpoint`.
#[derive(Default)]
pub struct ClosedLoop {
    last_negative_ms: u64,
}

impl ClosedLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(ctx: &GatewayContext) -> i32 {
        i32::from(ctx.total_weight()) - 2 * i32::from(ctx.telemetry.setpoint)
    }
}

impl State<SessionPhase, GatewayContext> for ClosedLoop {
    fn name(&self) -> &'static str {
        "OperationClosedLoop"
    }

    fn enter(&mut self, ctx: &mut GatewayContext) {
        ctx.enter_phase(SessionPhase::OperationClosedLoop);
        self.last_negative_ms = ctx.now_ms();
    }

    fn on_loop(&mut self, ctx: &mut GatewayContext) -> Next<SessionPhase> {
        if link_lost(ctx, SessionPhase::OperationClosedLoop) {
            return Next::To(SessionPhase::OperationStop);
        }
        let now = ctx.now_ms();
        let error = Self::error(ctx);
        if error < 0 {
            self.last_negative_ms = now;
        }
        let held = now.saturating_sub(self.last_negative_ms);
        let clamped = error.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        ctx.phase_block().put_i16(1, clamped).put_u16(3, ms_u16(held));
        ctx.publish(Burst::closed());
        if held >= u64::from(ctx.telemetry.params.hold_ms) {
            info!(error, held_ms = held, "setpoint held; stopping");
            return Next::To(SessionPhase::OperationStop);
        }
        Next::Stay
    }

    fn on_control(&mut self, ctx: &mut GatewayContext, cmd: &ControlCommand) -> Next<SessionPhase> {
        operation_control(ctx, SessionPhase::OperationClosedLoop, cmd)
    }
}

// ── Stop ─────────────────────────────────────────────────────────────────────

/// Open-loop ramp from the last feedback width down to zero.
#[derive(Default)]
pub struct Stop {
    commanded: u16,
    ramp: Option<Ramp>,
}

impl Stop {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State<SessionPhase, GatewayContext> for Stop {
    fn name(&self) -> &'static str {
        "OperationStop"
    }

    fn enter(&mut self, ctx: &mut GatewayContext) {
        ctx.enter_phase(SessionPhase::OperationStop);
        let p = ctx.telemetry.params;
        self.commanded = ctx.telemetry.feedback_width;
        self.ramp = Some(Ramp::new(
            0,
            u16::from(p.ramp_down_step),
            u64::from(p.ramp_down_interval_ms),
            ctx.now_ms(),
        ));
    }

    fn on_loop(&mut self, ctx: &mut GatewayContext) -> Next<SessionPhase> {
        let now = ctx.now_ms();
        if let Some(ramp) = self.ramp.as_mut() {
            if let Some(next) = ramp.advance(self.commanded, now) {
                self.commanded = next;
            }
            ctx.telemetry.phase.put_u16(1, ms_u16(ramp.ms_since_step(now)));
        }
        ctx.telemetry.requested_width = self.commanded;
        ctx.publish(Burst::open(self.commanded));
        let drained = self.commanded == 0 && ctx.telemetry.feedback_width == 0;
        if drained && !ctx.link_up() {
            info!("stopped with phone gone; disconnecting");
            return Next::To(SessionPhase::Disconnected);
        }
        Next::Stay
    }

    fn on_control(&mut self, ctx: &mut GatewayContext, cmd: &ControlCommand) -> Next<SessionPhase> {
        operation_control(ctx, SessionPhase::OperationStop, cmd)
    }

    fn exit(&mut self, _ctx: &mut GatewayContext) {
        self.ramp = None;
    }
}
