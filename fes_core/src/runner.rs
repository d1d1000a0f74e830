//! Cooperative driver for a [`Node`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use fes_traits::Clock;

use crate::error::Result;
use crate::status::{Node, StepOutcome};

/// Pacing and an optional step budget for [`run_node`].
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Sleep between iterations.
    pub period: Duration,
    /// Stop after this many steps; `None` runs until shutdown.
    pub max_steps: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(1),
            max_steps: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub steps: u64,
    pub restarts: u32,
}

/// Step `node` until `shutdown` is set or the step budget is spent.
///
/// Node errors are fatal (an unregistered state or a machine that never
/// started) and end the run.
pub fn run_node<N: Node + ?Sized>(
    node: &mut N,
    clock: &dyn Clock,
    opts: RunOptions,
    shutdown: &AtomicBool,
) -> Result<RunStats> {
    let mut stats = RunStats::default();
    tracing::info!(node = node.name(), period_us = opts.period.as_micros() as u64, "node start");
    while !shutdown.load(Ordering::Relaxed) {
        if opts.max_steps.is_some_and(|max| stats.steps >= max) {
            break;
        }
        let outcome = node.step().wrap_err_with(|| format!("{} halted", node.name()));
        match outcome {
            Ok(StepOutcome::Running) => {}
            Ok(StepOutcome::Restarted) => stats.restarts += 1,
            Err(e) => {
                tracing::error!(node = node.name(), error = %e, "fatal node error");
                return Err(e);
            }
        }
        stats.steps += 1;
        clock.sleep(opts.period);
    }
    tracing::info!(
        node = node.name(),
        steps = stats.steps,
        restarts = stats.restarts,
        "node stop"
    );
    Ok(stats)
}
