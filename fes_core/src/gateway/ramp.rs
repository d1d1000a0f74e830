//! Fixed-step, fixed-interval ramp toward a target.

#[derive(Debug, Clone, Copy)]
pub struct Ramp {
    target: u16,
    step: u16,
    interval_ms: u64,
    last_step_ms: u64,
}

impl Ramp {
    /// The first step is taken one interval after `now_ms`.
    pub fn new(target: u16, step: u16, interval_ms: u64, now_ms: u64) -> Self {
        Self {
            target,
            step: step.max(1),
            interval_ms,
            last_step_ms: now_ms,
        }
    }

    pub fn target(&self) -> u16 {
        self.target
    }

    /// Move the target without touching the step timing.
    pub fn retarget(&mut self, target: u16) {
        self.target = target;
    }

    pub fn is_done(&self, current: u16) -> bool {
        current == self.target
    }

    pub fn ms_since_step(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_step_ms)
    }

    /// Next value when an interval has elapsed and the target is not reached.
    /// Never overshoots the target.
    pub fn advance(&mut self, current: u16, now_ms: u64) -> Option<u16> {
        if self.is_done(current) || self.ms_since_step(now_ms) < self.interval_ms {
            return None;
        }
        self.last_step_ms = now_ms;
        let next = if current < self.target {
            current.saturating_add(self.step).min(self.target)
        } else {
            current.saturating_sub(self.step).max(self.target)
        };
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn climbs_one_step_per_interval() {
        let mut r = Ramp::new(3, 1, 100, 0);
        assert_eq!(r.advance(0, 99), None);
        assert_eq!(r.advance(0, 100), Some(1));
        assert_eq!(r.advance(1, 150), None);
        assert_eq!(r.advance(1, 200), Some(2));
        assert_eq!(r.advance(2, 300), Some(3));
        assert_eq!(r.advance(3, 400), None);
    }

    #[test]
    fn descends_without_undershoot() {
        let mut r = Ramp::new(0, 5, 200, 0);
        assert_eq!(r.advance(12, 200), Some(7));
        assert_eq!(r.advance(7, 400), Some(2));
        assert_eq!(r.advance(2, 600), Some(0));
        assert!(r.is_done(0));
    }

    #[test]
    fn retarget_keeps_step_timing() {
        let mut r = Ramp::new(15, 1, 100, 0);
        assert_eq!(r.advance(0, 100), Some(1));
        r.retarget(1);
        assert!(r.is_done(1));
        assert_eq!(r.advance(1, 200), None);
        r.retarget(3);
        assert_eq!(r.advance(1, 250), Some(2));
        assert_eq!(r.advance(2, 300), None);
    }

    #[test]
    fn zero_step_still_moves() {
        let mut r = Ramp::new(2, 0, 10, 0);
        assert_eq!(r.advance(0, 10), Some(1));
    }
}
