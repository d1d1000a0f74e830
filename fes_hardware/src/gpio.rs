use rppal::gpio::{Gpio, OutputPin};
use tracing::debug;

use fes_traits::{ChannelPair, PulsePort};

use crate::error::{HwError, Result};
use crate::util::busy_wait_us;

/// Biphasic output stage on four GPIO lines, two per channel pair.
pub struct GpioPulsePort {
    a: [OutputPin; 2],
    b: [OutputPin; 2],
}

impl GpioPulsePort {
    /// Claims the pins and drives them all low.
    pub fn new(pair_a: [u8; 2], pair_b: [u8; 2]) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let out = |pin: u8| -> Result<OutputPin> {
            gpio.get(pin)
                .map(|p| p.into_output_low())
                .map_err(|e| HwError::Gpio(format!("open pin {pin}: {e}")))
        };
        let port = Self {
            a: [out(pair_a[0])?, out(pair_a[1])?],
            b: [out(pair_b[0])?, out(pair_b[1])?],
        };
        debug!(?pair_a, ?pair_b, "pulse port ready");
        Ok(port)
    }
}

impl PulsePort for GpioPulsePort {
    fn set_pair(&mut self, pair: ChannelPair, high: bool) {
        let pins = match pair {
            ChannelPair::A => &mut self.a,
            ChannelPair::B => &mut self.b,
        };
        for pin in pins.iter_mut() {
            if high {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
    }

    fn all_low(&mut self) {
        for pin in self.a.iter_mut().chain(self.b.iter_mut()) {
            pin.set_low();
        }
    }

    fn delay_us(&mut self, us: u32) {
        busy_wait_us(us);
    }
}
