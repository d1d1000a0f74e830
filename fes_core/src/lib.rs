#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control core of the two-node FES gait system (hardware-agnostic).
//!
//! Both nodes run the same [`fsm::StateMachine`] engine with their own
//! context and state set. All hardware goes through the traits in
//! `fes_traits`; time comes from a `fes_traits::Clock`.
//!
//! ## Nodes
//!
//! - **Stimulator** (`stimulator`): resolves a pulse width in open loop,
//!   closed loop or failsafe and drives the biphasic pulse generator.
//! - **Gateway** (`gateway`): sequences the session phases, reads the
//!   scale and trigger, bridges to the phone and feeds the stimulator.
//!
//! Each node is a [`status::Node`]; one `step()` drains the bus, handles
//! pending phone writes and runs the current state's loop once.

pub mod config;
pub mod conversions;
pub mod error;
pub mod fsm;
pub mod gateway;
pub mod hw_error;
pub mod runner;
pub mod status;
pub mod stimulator;
pub mod telemetry;
pub mod util;

pub use config::{GatewayCfg, StimulatorCfg};
pub use error::{FesError, Report, Result};
pub use gateway::{GatewayHardware, GatewayNode, SessionPhase};
pub use status::{Node, StepOutcome};
pub use stimulator::{StimulatorNode, StimulatorState};
pub use telemetry::{SessionParams, Telemetry};
