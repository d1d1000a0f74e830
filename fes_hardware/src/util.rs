use std::time::{Duration, Instant};

/// Spin until `d` has elapsed.
///
/// Used for the microsecond pulse phases where `thread::sleep` granularity is
/// far too coarse. Never call this with more than a few hundred microseconds.
#[inline]
pub fn busy_wait(d: Duration) {
    let deadline = Instant::now() + d;
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

#[inline]
pub fn busy_wait_us(us: u32) {
    if us == 0 {
        return;
    }
    busy_wait(Duration::from_micros(u64::from(us)));
}
