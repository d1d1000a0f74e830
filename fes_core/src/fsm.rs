//! Generic state machine shared by both nodes.
//!
//! States are registered once under an id. Callbacks never switch states
//! themselves; they return a [`Transition`] and the machine applies it, which
//! keeps the exit-before-enter ordering in one place.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use fes_protocol::{ControlCommand, Message};
use tracing::{error, info};

use crate::error::{FesError, Result};

/// What a callback wants the machine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<Id> {
    Stay,
    To(Id),
}

/// One state. Every callback is optional; the defaults ignore the event.
pub trait State<Id, Ctx> {
    fn name(&self) -> &'static str;

    fn enter(&mut self, _ctx: &mut Ctx) {}

    fn on_loop(&mut self, _ctx: &mut Ctx) -> Transition<Id> {
        Transition::Stay
    }

    fn on_message(&mut self, _ctx: &mut Ctx, _msg: &Message) -> Transition<Id> {
        Transition::Stay
    }

    fn on_control(&mut self, _ctx: &mut Ctx, _cmd: &ControlCommand) -> Transition<Id> {
        Transition::Stay
    }

    fn exit(&mut self, _ctx: &mut Ctx) {}
}

type BoxedState<Id, Ctx> = Box<dyn State<Id, Ctx> + Send>;

pub struct StateMachine<Id, Ctx> {
    states: HashMap<Id, BoxedState<Id, Ctx>>,
    current: Option<Id>,
}

impl<Id, Ctx> Default for StateMachine<Id, Ctx> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
            current: None,
        }
    }
}

impl<Id, Ctx> StateMachine<Id, Ctx>
where
    Id: Copy + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `state` under `id`, replacing any previous registration.
    pub fn register(&mut self, id: Id, state: impl State<Id, Ctx> + Send + 'static) -> &mut Self {
        self.states.insert(id, Box::new(state));
        self
    }

    pub fn current(&self) -> Option<Id> {
        self.current
    }

    pub fn current_name(&self) -> Option<&'static str> {
        self.current
            .and_then(|id| self.states.get(&id))
            .map(|s| s.name())
    }

    /// Make `initial` current and run its `enter`. No `exit` runs.
    pub fn setup(&mut self, initial: Id, ctx: &mut Ctx) -> Result<()> {
        let state = self
            .states
            .get_mut(&initial)
            .ok_or_else(|| unknown(initial))?;
        self.current = Some(initial);
        info!(state = state.name(), "initial state");
        state.enter(ctx);
        Ok(())
    }

    /// Run `exit` on the current state, then `enter` on `target`.
    ///
    /// An unregistered target is fatal and leaves the machine untouched.
    pub fn switch_to(&mut self, target: Id, ctx: &mut Ctx) -> Result<()> {
        if !self.states.contains_key(&target) {
            return Err(unknown(target));
        }
        let from = self.current.ok_or(FesError::NotStarted)?;
        if let Some(old) = self.states.get_mut(&from) {
            old.exit(ctx);
        }
        self.current = Some(target);
        if let Some(new) = self.states.get_mut(&target) {
            info!(from = ?from, state = new.name(), "transition");
            new.enter(ctx);
        }
        Ok(())
    }

    /// Run the current state's loop callback once.
    pub fn run_loop(&mut self, ctx: &mut Ctx) -> Result<()> {
        let t = self.with_current(|s| s.on_loop(ctx))?;
        self.apply(t, ctx)
    }

    pub fn dispatch_message(&mut self, msg: &Message, ctx: &mut Ctx) -> Result<()> {
        let t = self.with_current(|s| s.on_message(ctx, msg))?;
        self.apply(t, ctx)
    }

    pub fn dispatch_control(&mut self, cmd: &ControlCommand, ctx: &mut Ctx) -> Result<()> {
        let t = self.with_current(|s| s.on_control(ctx, cmd))?;
        self.apply(t, ctx)
    }

    fn with_current<R>(&mut self, f: impl FnOnce(&mut BoxedState<Id, Ctx>) -> R) -> Result<R> {
        let id = self.current.ok_or(FesError::NotStarted)?;
        let state = self.states.get_mut(&id).ok_or_else(|| unknown(id))?;
        Ok(f(state))
    }

    fn apply(&mut self, t: Transition<Id>, ctx: &mut Ctx) -> Result<()> {
        match t {
            Transition::Stay => Ok(()),
            Transition::To(target) => self.switch_to(target, ctx),
        }
    }
}

fn unknown<Id: Debug>(id: Id) -> eyre::Report {
    error!(target_state = ?id, "transition to unregistered state");
    FesError::UnknownState(format!("{id:?}")).into()
}
