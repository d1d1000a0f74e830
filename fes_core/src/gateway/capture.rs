//! ParallelWeight and IntensityCapture: the values a session is built on.

use fes_protocol::{ControlCode, ControlCommand};
use tracing::info;

use super::params::{self, KEY_BODY_WEIGHT, KEY_MESE};
use super::ramp::Ramp;
use super::{Burst, GatewayContext, SessionPhase};
use crate::fsm::{State, Transition};
use crate::util::scale_percent;

/// Captures the patient's body weight standing in the parallel bars.
#[derive(Default)]
pub struct ParallelWeight;

impl ParallelWeight {
    pub fn new() -> Self {
        Self
    }
}

impl State<SessionPhase, GatewayContext> for ParallelWeight {
    fn name(&self) -> &'static str {
        "ParallelWeight"
    }

    fn enter(&mut self, ctx: &mut GatewayContext) {
        ctx.enter_phase(SessionPhase::ParallelWeight);
        let current = ctx.telemetry.body_weight;
        ctx.telemetry.body_weight = params::read_or(ctx.store(), KEY_BODY_WEIGHT, current);
    }

    fn on_loop(&mut self, ctx: &mut GatewayContext) -> Transition<SessionPhase> {
        if !ctx.link_up() {
            return Transition::To(SessionPhase::Disconnected);
        }
        ctx.publish(Burst::idle());
        Transition::Stay
    }

    fn on_control(
        &mut self,
        ctx: &mut GatewayContext,
        cmd: &ControlCommand,
    ) -> Transition<SessionPhase> {
        match cmd.code {
            ControlCode::WeightRegister => {
                ctx.telemetry.body_weight = ctx.total_weight();
                info!(body_weight = ctx.telemetry.body_weight, "body weight registered");
            }
            ControlCode::WeightSetFromArgument => {
                ctx.telemetry.body_weight = u16::from(cmd.payload);
                info!(body_weight = ctx.telemetry.body_weight, "body weight set");
            }
            ControlCode::WeightGoBack => return Transition::To(SessionPhase::ParameterSetup),
            ControlCode::WeightComplete => return Transition::To(SessionPhase::IntensityCapture),
            _ => {}
        }
        Transition::Stay
    }

    fn exit(&mut self, ctx: &mut GatewayContext) {
        let w = ctx.telemetry.body_weight;
        params::write(ctx.store_mut(), KEY_BODY_WEIGHT, w);
    }
}

/// Finds MESE by stepping a candidate width up and down under open loop.
///
/// Registering the candidate stores it as MESE and winds the candidate back
/// to zero so the patient is not left stimulated.
#[derive(Default)]
pub struct IntensityCapture {
    candidate: u16,
    winding_down: Option<Ramp>,
}

impl IntensityCapture {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, ctx: &mut GatewayContext) {
        let t = &mut ctx.telemetry;
        t.mese = self.candidate;
        t.mese_max = scale_percent(t.mese, ctx.cfg.ceiling_percent);
        info!(mese = t.mese, mese_max = t.mese_max, "MESE registered");
        let now = ctx.now_ms();
        self.winding_down = Some(Ramp::new(
            0,
            ctx.cfg.winding_down_step,
            ctx.cfg.winding_down_interval_ms,
            now,
        ));
    }
}

impl State<SessionPhase, GatewayContext> for IntensityCapture {
    fn name(&self) -> &'static str {
        "IntensityCapture"
    }

    fn enter(&mut self, ctx: &mut GatewayContext) {
        ctx.enter_phase(SessionPhase::IntensityCapture);
        self.candidate = 0;
        self.winding_down = None;
        let current = ctx.telemetry.mese;
        let mese = params::read_or(ctx.store(), KEY_MESE, current);
        ctx.telemetry.mese = mese;
        ctx.telemetry.mese_max = scale_percent(mese, ctx.cfg.ceiling_percent);
    }

    fn on_loop(&mut self, ctx: &mut GatewayContext) -> Transition<SessionPhase> {
        if !ctx.link_up() {
            return Transition::To(SessionPhase::Disconnected);
        }
        let now = ctx.now_ms();
        if let Some(ramp) = self.winding_down.as_mut()
            && let Some(next) = ramp.advance(self.candidate, now)
        {
            self.candidate = next;
        }
        if self.winding_down.is_some_and(|r| r.is_done(self.candidate)) {
            self.winding_down = None;
        }
        ctx.phase_block()
            .put_u16(1, self.candidate)
            .put_u8(3, u8::from(self.winding_down.is_some()));
        ctx.publish(Burst::open(self.candidate));
        Transition::Stay
    }

    fn on_control(
        &mut self,
        ctx: &mut GatewayContext,
        cmd: &ControlCommand,
    ) -> Transition<SessionPhase> {
        match cmd.code {
            ControlCode::IntensityIncreaseOnce => {
                self.winding_down = None;
                self.candidate = self
                    .candidate
                    .saturating_add(ctx.cfg.capture_step)
                    .min(ctx.cfg.capture_max);
            }
            ControlCode::IntensityDecreaseOnce => {
                self.winding_down = None;
                self.candidate = self.candidate.saturating_sub(ctx.cfg.capture_step);
            }
            ControlCode::IntensityRegister => self.register(ctx),
            ControlCode::IntensityGoBack => return Transition::To(SessionPhase::ParallelWeight),
            ControlCode::IntensityComplete => return Transition::To(SessionPhase::OperationStart),
            _ => {}
        }
        Transition::Stay
    }

    fn exit(&mut self, ctx: &mut GatewayContext) {
        self.candidate = 0;
        self.winding_down = None;
        let mese = ctx.telemetry.mese;
        params::write(ctx.store_mut(), KEY_MESE, mese);
    }
}
