use std::{
    thread,
    time::{Duration, Instant},
};

// Hybrid wait tuning:
// - Sleep in small chunks until we're close to the deadline.
// - Spin for the final window for tighter frame pacing.
const MAX_SLEEP_CHUNK: Duration = Duration::from_millis(4);
const SPIN_THRESHOLD: Duration = Duration::from_micros(300);
const SPIN_YIELD_EVERY: u32 = 512;

/// Wall-clock source and sleep primitive used by [`FrameClock`](super::FrameClock).
///
/// `sleep` may return before the requested duration has elapsed (signal
/// wake-ups, chunked sleeping). Callers re-sample `now` and sleep again.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&mut self, duration: Duration);
}

/// The host's monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        // Coarse phase: one bounded sleep while still far from the target,
        // always leaving a final spin window.
        if duration > SPIN_THRESHOLD {
            thread::sleep((duration - SPIN_THRESHOLD).min(MAX_SLEEP_CHUNK));
            return;
        }

        // Fine phase: spin to the target.
        let target = Instant::now() + duration;
        let mut spins: u32 = 0;
        while Instant::now() < target {
            std::hint::spin_loop();
            spins = spins.wrapping_add(1);
            if spins.is_multiple_of(SPIN_YIELD_EVERY) {
                thread::yield_now();
            }
        }
    }
}
