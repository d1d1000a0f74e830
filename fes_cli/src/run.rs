//! Real-time node loops on bench peripherals.
//!
//! Each node gets its own thread; both share one `MonotonicClock` and are
//! joined by a simulated bus. A fatal error on one node stops the other.
//! When only one node runs, a drain thread plays the absent peer and discards
//! whatever the node sends. The phone link, scale and trigger are simulated,
//! so the gateway idles in Disconnected. With the `hardware` feature on Linux
//! the stimulator drives the GPIO output stage from `[pins]`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use fes_config::Config;
use fes_core::runner::{RunOptions, RunStats, run_node};
use fes_core::{
    GatewayCfg, GatewayHardware, GatewayNode, Node, StimulatorCfg, StimulatorNode,
};
use fes_hardware::{SimBus, SimScale, SimTrigger, SimWireless};
use fes_traits::{Bus, Clock, MonotonicClock, PulsePort};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::cli::NodeKind;

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub stimulator: Option<RunStats>,
    pub gateway: Option<RunStats>,
}

impl RunReport {
    pub fn to_json(&self) -> serde_json::Value {
        let stats = |s: &Option<RunStats>| {
            s.map(|s| json!({ "steps": s.steps, "restarts": s.restarts }))
        };
        json!({ "stimulator": stats(&self.stimulator), "gateway": stats(&self.gateway) })
    }

    pub fn render_text(&self) -> String {
        let mut out = Vec::new();
        for (name, stats) in [("stimulator", self.stimulator), ("gateway", self.gateway)] {
            if let Some(s) = stats {
                out.push(format!("{name}: {} steps, {} restarts", s.steps, s.restarts));
            }
        }
        out.join("\n")
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn pulse_port(cfg: &Config) -> eyre::Result<Box<dyn PulsePort + Send>> {
    let port = fes_hardware::GpioPulsePort::new(cfg.pins.pair_a, cfg.pins.pair_b)?;
    Ok(Box::new(port))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn pulse_port(_cfg: &Config) -> eyre::Result<Box<dyn PulsePort + Send>> {
    Ok(Box::new(fes_hardware::PulseCounter::new()))
}

fn join(
    name: &str,
    handle: thread::ScopedJoinHandle<'_, eyre::Result<RunStats>>,
) -> eyre::Result<RunStats> {
    handle
        .join()
        .map_err(|_| eyre::eyre!("{name} thread panicked"))?
}

fn run_or_stop_all<N: Node>(
    node: &mut N,
    clock: &dyn Clock,
    opts: RunOptions,
    shutdown: &AtomicBool,
) -> eyre::Result<RunStats> {
    let result = run_node(node, clock, opts, shutdown);
    if result.is_err() {
        shutdown.store(true, Ordering::Relaxed);
    }
    result
}

/// Stand-in for the missing node: empty the bus every `period` until `done`.
/// Returns how many frames were discarded.
fn drain_peer(
    mut peer: SimBus,
    clock: &dyn Clock,
    period: Duration,
    done: &AtomicBool,
) -> u64 {
    let mut dropped = 0u64;
    while !done.load(Ordering::Relaxed) {
        loop {
            match peer.try_recv() {
                Ok(Some(_)) => dropped += 1,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "idle bus peer failed; no longer draining");
                    return dropped;
                }
            }
        }
        clock.sleep(period);
    }
    debug!(dropped, "idle bus peer stopped");
    dropped
}

pub fn run(
    cfg: &Config,
    kind: NodeKind,
    duration_ms: Option<u64>,
    period_us: u64,
    shutdown: &AtomicBool,
) -> eyre::Result<RunReport> {
    let period = Duration::from_micros(period_us.max(1));
    let max_steps = duration_ms.map(|ms| ms.saturating_mul(1000) / period_us.max(1));
    let opts = RunOptions { period, max_steps };
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let (gw_bus, stim_bus) = SimBus::pair(1024);
    let (stim_bus, gw_bus, idle_peer) = match kind {
        NodeKind::Both => (Some(stim_bus), Some(gw_bus), None),
        NodeKind::Stimulator => (Some(stim_bus), None, Some(gw_bus)),
        NodeKind::Gateway => (None, Some(gw_bus), Some(stim_bus)),
    };
    info!(?kind, ?duration_ms, period_us, "starting node loops");

    let mut stimulator = stim_bus
        .map(|bus| {
            StimulatorNode::new(
                Box::new(bus),
                pulse_port(cfg)?,
                Arc::clone(&clock),
                StimulatorCfg::from(&cfg.stimulator),
            )
        })
        .transpose()?;
    let mut gateway = gw_bus
        .map(|bus| {
            GatewayNode::new(
                GatewayHardware {
                    bus: Box::new(bus),
                    wireless: Box::new(SimWireless::new()),
                    scale: Box::new(SimScale::new()),
                    trigger: Box::new(SimTrigger::new()),
                    store: Box::new(fes_config::FileStore::open(&cfg.store.path)?),
                },
                Arc::clone(&clock),
                GatewayCfg::from(cfg),
            )
        })
        .transpose()?;

    let clock: &(dyn Clock + Send + Sync) = &*clock;
    let done = &AtomicBool::new(false);
    thread::scope(|s| -> eyre::Result<RunReport> {
        let drain = idle_peer.map(|peer| s.spawn(move || drain_peer(peer, clock, period, done)));
        let stim = stimulator
            .as_mut()
            .map(|node| s.spawn(move || run_or_stop_all(node, clock, opts, shutdown)));
        let gw = gateway
            .as_mut()
            .map(|node| s.spawn(move || run_or_stop_all(node, clock, opts, shutdown)));
        let stim_stats = stim.map(|h| join("stimulator", h)).transpose();
        let gw_stats = gw.map(|h| join("gateway", h)).transpose();
        // the drain loop only ends once the nodes are done
        done.store(true, Ordering::Relaxed);
        if let Some(h) = drain {
            let dropped = h
                .join()
                .map_err(|_| eyre::eyre!("bus drain thread panicked"))?;
            info!(dropped, "lone node run finished");
        }
        Ok(RunReport {
            stimulator: stim_stats?,
            gateway: gw_stats?,
        })
    })
}
