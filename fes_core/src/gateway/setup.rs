//! Disconnected and ParameterSetup.

use fes_protocol::{ControlCode, ControlCommand};
use tracing::{info, warn};

use super::params;
use super::{Burst, GatewayContext, SessionPhase};
use crate::fsm::{State, Transition};

/// Waits for the phone. Entering it wipes the session.
#[derive(Default)]
pub struct Disconnected;

impl Disconnected {
    pub fn new() -> Self {
        Self
    }
}

impl State<SessionPhase, GatewayContext> for Disconnected {
    fn name(&self) -> &'static str {
        "Disconnected"
    }

    fn enter(&mut self, ctx: &mut GatewayContext) {
        ctx.telemetry.reset();
        ctx.enter_phase(SessionPhase::Disconnected);
    }

    fn on_loop(&mut self, ctx: &mut GatewayContext) -> Transition<SessionPhase> {
        ctx.publish(Burst::idle());
        if ctx.link_up() {
            Transition::To(SessionPhase::ParameterSetup)
        } else {
            Transition::Stay
        }
    }
}

/// Edits the session parameters; changes persist only on save.
#[derive(Default)]
pub struct ParameterSetup;

impl ParameterSetup {
    pub fn new() -> Self {
        Self
    }
}

impl State<SessionPhase, GatewayContext> for ParameterSetup {
    fn name(&self) -> &'static str {
        "ParameterSetup"
    }

    fn enter(&mut self, ctx: &mut GatewayContext) {
        ctx.enter_phase(SessionPhase::ParameterSetup);
        ctx.telemetry.params = params::load(ctx.store(), &ctx.cfg.param_defaults);
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
            ControlCode::SetupComplete => return Transition::To(SessionPhase::ParallelWeight),
            ControlCode::SetupResetDefaults => {
                if !params::reset(ctx.store_mut()) {
                    warn!("some session parameters could not be removed");
                }
                ctx.telemetry.params = params::load(ctx.store(), &ctx.cfg.param_defaults);
                info!("session parameters reset to defaults");
            }
            ControlCode::SetupSave => {
                let p = ctx.telemetry.params;
                if params::save(ctx.store_mut(), &p) {
                    info!(params = ?p, "session parameters saved");
                }
            }
            code => {
                if params::apply_edit(&mut ctx.telemetry.params, code, cmd.payload) {
                    info!(code = ?code, payload = cmd.payload, "parameter edited");
                }
            }
        }
        Transition::Stay
    }
}
