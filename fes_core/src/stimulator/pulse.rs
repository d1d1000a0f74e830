//! Biphasic pulse generator.
//!
//! Each cycle raises channel pair A for `W` µs, waits 4 µs, raises pair B for
//! `W` µs and waits 4 µs again. Widths under 10 µs produce no pulse, only an
//! 8 µs idle with every channel low.
//!
//! The wait before the next cycle is derived from the width that was emitted
//! in the cycle just finished: `period = 1e6 / rate - (2W - 8)`. A width change
//! therefore only affects timing one cycle later.

use fes_traits::{ChannelPair, PulsePort};
use tracing::trace;

use crate::util::MICROS_PER_SEC;

/// Below this width nothing is emitted.
pub const MIN_PULSE_WIDTH_US: u16 = 10;
/// Gap after each phase of a pulse.
pub const PHASE_GAP_US: u32 = 4;
/// Idle time when the width is too small to pulse.
pub const IDLE_US: u32 = 8;

pub struct PulseGenerator<P: PulsePort> {
    port: P,
    nominal_period_us: u64,
    period_us: u64,
    last_fire_us: Option<u64>,
}

impl<P: PulsePort> PulseGenerator<P> {
    /// Takes ownership of the port and drives every channel low.
    pub fn new(mut port: P, rate_hz: u32) -> Self {
        port.all_low();
        Self {
            port,
            nominal_period_us: MICROS_PER_SEC / u64::from(rate_hz.max(1)),
            period_us: 0,
            last_fire_us: None,
        }
    }

    /// Inter-cycle period that follows a cycle emitted at `width`.
    pub fn period_after(&self, width: u16) -> u64 {
        let busy = 2 * i64::from(width) - 8;
        (self.nominal_period_us as i64 - busy).max(0) as u64
    }

    /// Period currently gating the next fire.
    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    /// Emit one cycle at `width` if the previous period has elapsed.
    /// Returns whether a cycle was emitted.
    pub fn tick(&mut self, width: u16, now_us: u64) -> bool {
        let due = match self.last_fire_us {
            None => true,
            Some(last) => now_us.saturating_sub(last) > self.period_us,
        };
        if !due {
            return false;
        }
        self.emit(width);
        self.last_fire_us = Some(now_us);
        self.period_us = self.period_after(width);
        trace!(width, period_us = self.period_us, "pulse cycle");
        true
    }

    /// Channels low and timing forgotten, as after power-up.
    pub fn reset(&mut self) {
        self.port.all_low();
        self.period_us = 0;
        self.last_fire_us = None;
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    fn emit(&mut self, width: u16) {
        if width < MIN_PULSE_WIDTH_US {
            self.port.all_low();
            self.port.delay_us(IDLE_US);
            return;
        }
        let w = u32::from(width);
        for pair in [ChannelPair::A, ChannelPair::B] {
            self.port.set_pair(pair, true);
            self.port.delay_us(w);
            self.port.set_pair(pair, false);
            self.port.delay_us(PHASE_GAP_US);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fes_hardware::{PortEvent, RecordingPort};

    fn generator() -> (PulseGenerator<RecordingPort>, RecordingPort) {
        let port = RecordingPort::new();
        let recorder = port.clone();
        let g = PulseGenerator::new(port, 35);
        recorder.clear();
        (g, recorder)
    }

    #[test]
    fn new_generator_drives_channels_low() {
        let port = RecordingPort::new();
        let recorder = port.clone();
        let _g = PulseGenerator::new(port, 35);
        assert_eq!(recorder.events(), vec![PortEvent::AllLow]);
    }

    #[test]
    fn narrow_width_idles_with_channels_low() {
        let (mut g, recorder) = generator();
        assert!(g.tick(9, 0));
        assert_eq!(recorder.events(), vec![PortEvent::AllLow, PortEvent::Delay(8)]);
    }

    #[test]
    fn wide_width_emits_two_phases() {
        let (mut g, recorder) = generator();
        assert!(g.tick(40, 0));
        assert_eq!(
            recorder.events(),
            vec![
                PortEvent::Set(ChannelPair::A, true),
                PortEvent::Delay(40),
                PortEvent::Set(ChannelPair::A, false),
                PortEvent::Delay(4),
                PortEvent::Set(ChannelPair::B, true),
                PortEvent::Delay(40),
                PortEvent::Set(ChannelPair::B, false),
                PortEvent::Delay(4),
            ]
        );
    }

    #[test]
    fn period_comes_from_previous_width() {
        let (mut g, _recorder) = generator();
        assert!(g.tick(100, 1_000));
        // 1e6/35 = 28571; minus (200 - 8)
        assert_eq!(g.period_us(), 28_379);
        assert!(!g.tick(10, 1_000 + 28_379));
        assert!(g.tick(10, 1_000 + 28_380));
        // The 10 µs cycle sets the gate for the one after it.
        assert_eq!(g.period_us(), 28_571 - 12);
    }

    #[test]
    fn zero_width_period_is_nominal_plus_idle() {
        let (g, _recorder) = generator();
        assert_eq!(g.period_after(0), 28_579);
    }

    #[test]
    fn huge_width_saturates_period_at_zero() {
        let (g, _recorder) = generator();
        assert_eq!(g.period_after(u16::MAX), 0);
    }

    #[test]
    fn reset_fires_on_next_tick() {
        let (mut g, _recorder) = generator();
        assert!(g.tick(50, 10));
        assert!(!g.tick(50, 20));
        g.reset();
        assert!(g.tick(50, 20));
    }
}
