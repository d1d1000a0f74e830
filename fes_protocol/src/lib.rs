#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Wire vocabulary shared by the stimulator, the gateway and the phone.
//!
//! - `bus`: node-to-node messages (one kind byte, big-endian u16 payload)
//! - `control`: two-byte control writes from the phone
//! - `status`: the packed little-endian record the gateway publishes
//!
//! Everything here is encode/decode only; no timing or state lives in this crate.

pub mod bus;
pub mod control;
pub mod error;
pub mod status;

pub use bus::{GainCoefficient, LoopMode, Message, MessageKind};
pub use control::{ControlCode, ControlCommand};
pub use error::ProtocolError;
pub use status::{PhaseTelemetry, STATUS_RECORD_LEN, SessionParamsEcho, StatusFlags, StatusRecord};
