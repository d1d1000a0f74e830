//! Device layer for the stimulator and gateway nodes.
//!
//! Default builds only contain the simulated devices in [`sim`]. The
//! `hardware` feature adds the GPIO pulse output on Linux boards.

pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod sim;
pub mod util;

pub use error::HwError;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio::GpioPulsePort;
pub use sim::{
    BusLink, MemoryStore, PhoneHandle, PortEvent, PulseCounter, RecordingPort, ScaleHandle,
    SimBus, SimScale, SimTrigger, SimWireless,
};
