use fes_protocol::{GainCoefficient, LoopMode, Message, MessageKind};
use tracing::{debug, info, warn};

use super::control_law::{ClosedLoopLaw, LawInputs};
use super::{StimulatorContext, StimulatorState};
use crate::fsm::{State, Transition};
use crate::telemetry::Telemetry;
use crate::util::Interval;

/// Copy a setpoint-style message into telemetry; other kinds are ignored.
fn apply_data(t: &mut Telemetry, msg: &Message) {
    let p = msg.payload;
    match msg.kind {
        MessageKind::WeightTotal => t.weight_total = p,
        MessageKind::ResidualWeightTotal => t.residual_weight = p,
        MessageKind::SetRequestedPulseWidth => t.requested_width = p,
        MessageKind::IntensityFloor => t.mese = p,
        MessageKind::IntensityCeiling => t.mese_max = p,
        MessageKind::Setpoint => t.setpoint = p,
        MessageKind::GainCoefficient => t.gain = GainCoefficient::from_percent(p),
        _ => {}
    }
}

/// Bus watchdog and feedback timer. Failsafe keeps only the feedback side.
#[derive(Debug, Clone, Copy)]
struct Link {
    last_rx_ms: u64,
    feedback: Interval,
}

impl Link {
    fn start(ctx: &StimulatorContext) -> Self {
        let now = ctx.now_ms();
        Self {
            last_rx_ms: now,
            feedback: Interval::new(ctx.cfg.feedback_period_ms, now),
        }
    }

    fn heard(&mut self, now_ms: u64) {
        self.last_rx_ms = now_ms;
    }

    fn timed_out(&self, ctx: &StimulatorContext, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_rx_ms) >= ctx.cfg.bus_timeout_ms
    }

    /// Drive the pulse output and report the width when the feedback timer fires.
    fn output(&mut self, ctx: &mut StimulatorContext, width: u16, now_ms: u64) {
        ctx.drive(width);
        if self.feedback.due(now_ms) {
            ctx.send(Message::new(MessageKind::PulseWidthFeedback, width));
        }
    }
}

// ── OpenLoop ─────────────────────────────────────────────────────────────────

/// Passes the commanded width straight through.
#[derive(Default)]
pub struct OpenLoop {
    link: Option<Link>,
}

impl OpenLoop {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State<StimulatorState, StimulatorContext> for OpenLoop {
    fn name(&self) -> &'static str {
        "OpenLoop"
    }

    fn enter(&mut self, ctx: &mut StimulatorContext) {
        self.link = Some(Link::start(ctx));
    }

    fn on_loop(&mut self, ctx: &mut StimulatorContext) -> Transition<StimulatorState> {
        let now = ctx.now_ms();
        let Some(link) = self.link.as_mut() else {
            return Transition::Stay;
        };
        if link.timed_out(ctx, now) {
            warn!(silent_ms = now - link.last_rx_ms, "bus silent in open loop");
            return Transition::To(StimulatorState::Failsafe);
        }
        let requested = ctx.telemetry.requested_width;
        let width = if requested < ctx.cfg.min_active_width {
            0
        } else {
            requested
        };
        link.output(ctx, width, now);
        Transition::Stay
    }

    fn on_message(
        &mut self,
        ctx: &mut StimulatorContext,
        msg: &Message,
    ) -> Transition<StimulatorState> {
        let now = ctx.now_ms();
        if let Some(link) = self.link.as_mut() {
            link.heard(now);
        }
        match msg.kind {
            MessageKind::PeerResetNotification => {
                info!("reset requested by peer");
                ctx.request_restart();
                Transition::Stay
            }
            MessageKind::ModeFlag if LoopMode::from_payload(msg.payload) == LoopMode::Closed => {
                Transition::To(StimulatorState::ClosedLoop)
            }
            _ => {
                apply_data(&mut ctx.telemetry, msg);
                Transition::Stay
            }
        }
    }

    fn exit(&mut self, _ctx: &mut StimulatorContext) {
        self.link = None;
    }
}

// ── ClosedLoop ───────────────────────────────────────────────────────────────

/// Computes the width from the weight on the scale.
#[derive(Default)]
pub struct ClosedLoop {
    link: Option<Link>,
    law: ClosedLoopLaw,
}

impl ClosedLoop {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State<StimulatorState, StimulatorContext> for ClosedLoop {
    fn name(&self) -> &'static str {
        "ClosedLoop"
    }

    fn enter(&mut self, ctx: &mut StimulatorContext) {
        self.law.reset();
        self.link = Some(Link::start(ctx));
    }

    fn on_loop(&mut self, ctx: &mut StimulatorContext) -> Transition<StimulatorState> {
        let now = ctx.now_ms();
        let Some(link) = self.link.as_mut() else {
            return Transition::Stay;
        };
        if link.timed_out(ctx, now) {
            warn!(silent_ms = now - link.last_rx_ms, "bus silent in closed loop");
            return Transition::To(StimulatorState::Failsafe);
        }
        let t = &ctx.telemetry;
        let width = self.law.resolve(&LawInputs {
            weight_total: t.weight_total,
            residual_weight: t.residual_weight,
            mese: t.mese,
            mese_max: t.mese_max,
            gain: t.gain,
        });
        link.output(ctx, width, now);
        Transition::Stay
    }

    fn on_message(
        &mut self,
        ctx: &mut StimulatorContext,
        msg: &Message,
    ) -> Transition<StimulatorState> {
        let now = ctx.now_ms();
        if let Some(link) = self.link.as_mut() {
            link.heard(now);
        }
        match msg.kind {
            MessageKind::PeerResetNotification | MessageKind::PeerRestartedNotification => {
                warn!(kind = ?msg.kind, "peer reset during closed loop");
                ctx.note_peer_reset();
                Transition::To(StimulatorState::Failsafe)
            }
            MessageKind::ModeFlag if LoopMode::from_payload(msg.payload) == LoopMode::Open => {
                Transition::To(StimulatorState::OpenLoop)
            }
            _ => {
                apply_data(&mut ctx.telemetry, msg);
                Transition::Stay
            }
        }
    }

    fn exit(&mut self, _ctx: &mut StimulatorContext) {
        self.link = None;
    }
}

// ── Failsafe ─────────────────────────────────────────────────────────────────

/// Decays the last width to zero, ignoring commands. The decaying width is
/// still reported so the gateway sees the output drain.
#[derive(Default)]
pub struct Failsafe {
    link: Option<Link>,
    width: u16,
    anchor_ms: u64,
    restart_pending: bool,
}

impl Failsafe {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State<StimulatorState, StimulatorContext> for Failsafe {
    fn name(&self) -> &'static str {
        "Failsafe"
    }

    fn enter(&mut self, ctx: &mut StimulatorContext) {
        self.width = ctx.resolved_width();
        self.anchor_ms = ctx.now_ms();
        self.restart_pending = ctx.take_peer_reset();
        self.link = Some(Link::start(ctx));
        warn!(
            width = self.width,
            restart_pending = self.restart_pending,
            "failsafe engaged"
        );
    }

    fn on_loop(&mut self, ctx: &mut StimulatorContext) -> Transition<StimulatorState> {
        let now = ctx.now_ms();
        let interval = ctx.cfg.failsafe_decay_interval_ms.max(1);
        let steps = now.saturating_sub(self.anchor_ms) / interval;
        if steps > 0 {
            let drop = steps.saturating_mul(u64::from(ctx.cfg.failsafe_decay_step));
            self.width = self
                .width
                .saturating_sub(u16::try_from(drop).unwrap_or(u16::MAX));
            self.anchor_ms += steps * interval;
            debug!(width = self.width, "failsafe decay");
        }
        match self.link.as_mut() {
            Some(link) => link.output(ctx, self.width, now),
            None => ctx.drive(self.width),
        }
        if self.restart_pending && self.width == 0 {
            info!("failsafe drained after peer reset; restarting");
            ctx.request_restart();
        }
        Transition::Stay
    }

    fn on_message(
        &mut self,
        _ctx: &mut StimulatorContext,
        msg: &Message,
    ) -> Transition<StimulatorState> {
        if matches!(
            msg.kind,
            MessageKind::PeerResetNotification | MessageKind::PeerRestartedNotification
        ) {
            self.restart_pending = true;
        }
        Transition::Stay
    }

    fn exit(&mut self, _ctx: &mut StimulatorContext) {
        self.link = None;
    }
}
