//! Debounced weight classes.
//!
//! A reading is bucketed into `floor(w / size)` kilograms; phase gates ask
//! whether a class has been held long enough rather than looking at raw
//! load-cell noise.

/// Bucket of a weight reading.
#[inline]
pub fn weight_class(weight: u16, size: u16) -> u16 {
    weight / size.max(1)
}

#[derive(Debug, Clone, Copy)]
pub struct WeightClassTracker {
    size: u16,
    class: u16,
    changed_at_ms: u64,
}

impl WeightClassTracker {
    pub fn new(size: u16, weight: u16, now_ms: u64) -> Self {
        Self {
            size: size.max(1),
            class: weight_class(weight, size),
            changed_at_ms: now_ms,
        }
    }

    /// Start timing again from `now_ms` with the class of `weight`.
    pub fn reset(&mut self, weight: u16, now_ms: u64) {
        self.class = weight_class(weight, self.size);
        self.changed_at_ms = now_ms;
    }

    /// Feed a reading; returns the current class.
    pub fn update(&mut self, weight: u16, now_ms: u64) -> u16 {
        let c = weight_class(weight, self.size);
        if c != self.class {
            self.class = c;
            self.changed_at_ms = now_ms;
        }
        self.class
    }

    pub fn class(&self) -> u16 {
        self.class
    }

    pub fn held_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.changed_at_ms)
    }

    /// True once `class` has been held for at least `duration_ms`.
    pub fn stable(&self, class: u16, duration_ms: u64, now_ms: u64) -> bool {
        self.class == class && self.held_ms(now_ms) >= duration_ms
    }
}
