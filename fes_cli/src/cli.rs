//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "fes", version, about = "FES gait rehabilitation nodes")]
pub struct Cli {
    /// Path to config TOML (typed); built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum NodeKind {
    /// Only the stimulator (output stage, closed-loop law)
    Stimulator,
    /// Only the gateway (session sequencer)
    Gateway,
    /// Both nodes, each on its own thread, joined by a simulated bus
    Both,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scripted session with both nodes on simulated hardware
    Simulate {
        /// Patient body weight in kg
        #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u8).range(20..))]
        body_weight: u8,
        /// Intensity increase commands before registering the MESE
        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..))]
        mese_steps: u8,
        /// Simulated time budget in ms
        #[arg(long, value_name = "MS", default_value_t = 60_000)]
        max_ms: u64,
    },
    /// Run node loops in real time on bench peripherals until Ctrl-C
    /// (or the duration elapses)
    Run {
        #[arg(value_enum, default_value_t = NodeKind::Both)]
        node: NodeKind,
        /// Stop after this many ms
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
        /// Loop period in µs
        #[arg(long, value_name = "US", default_value_t = 1000)]
        period_us: u64,
    },
    /// Inspect or clear the persisted session parameters
    Params {
        #[command(subcommand)]
        action: ParamsAction,
    },
    /// Validate the configuration and the parameter store
    SelfCheck,
}

#[derive(Subcommand, Debug)]
pub enum ParamsAction {
    /// Print stored values and the effective session parameters
    Show,
    /// Erase every stored value
    Reset,
}
