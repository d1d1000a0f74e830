//! Outcome of one cooperative node iteration.

/// Public status of a single `step()` of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Keep going.
    Running,
    /// The node restarted itself during this step and is back in its boot state.
    Restarted,
}

/// A node that can be driven one iteration at a time.
pub trait Node {
    fn name(&self) -> &'static str;
    fn step(&mut self) -> crate::error::Result<StepOutcome>;
}
