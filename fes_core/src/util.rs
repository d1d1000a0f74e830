//! Common time and arithmetic helpers for fes_core.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Polled periodic timer against a monotonic millisecond counter.
///
/// `due(now)` returns true at most once per period and rearms from `now`,
/// so a stalled loop does not produce a burst of catch-up ticks.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    period_ms: u64,
    last_ms: u64,
}

impl Interval {
    pub fn new(period_ms: u64, now_ms: u64) -> Self {
        Self {
            period_ms,
            last_ms: now_ms,
        }
    }

    #[inline]
    pub fn due(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_ms) >= self.period_ms {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn restart(&mut self, now_ms: u64) {
        self.last_ms = now_ms;
    }

    #[inline]
    pub fn since_last(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ms)
    }
}

/// `value * percent / 100`, truncated and saturated to u16.
#[inline]
pub fn scale_percent(value: u16, percent: u16) -> u16 {
    let scaled = u32::from(value) * u32::from(percent) / 100;
    u16::try_from(scaled).unwrap_or(u16::MAX)
}

/// Clamp a signed reading to the u16 range.
#[inline]
pub fn clamp_u16(v: i64) -> u16 {
    v.clamp(0, i64::from(u16::MAX)) as u16
}

/// Saturating conversion for millisecond counters shown in 16-bit telemetry.
#[inline]
pub fn ms_u16(ms: u64) -> u16 {
    u16::try_from(ms).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_fires_once_per_period() {
        let mut iv = Interval::new(15, 0);
        assert!(!iv.due(14));
        assert!(iv.due(15));
        assert!(!iv.due(29));
        assert!(iv.due(30));
    }

    #[test]
    fn interval_rearms_from_late_tick() {
        let mut iv = Interval::new(10, 0);
        assert!(iv.due(35));
        assert!(!iv.due(44));
        assert!(iv.due(45));
    }

    #[test]
    fn scale_percent_truncates() {
        assert_eq!(scale_percent(123, 120), 147);
        assert_eq!(scale_percent(61, 50), 30);
        assert_eq!(scale_percent(u16::MAX, 200), u16::MAX);
    }

    #[test]
    fn clamp_u16_floors_negative_readings() {
        assert_eq!(clamp_u16(-5), 0);
        assert_eq!(clamp_u16(70_000), u16::MAX);
    }
}
