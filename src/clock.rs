// clock.rs

use crate::*;

/// Monotonic time source plus the blocking delay used for pacing and backoff.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// `std::time` backed clock. Works on the host and on ESP-IDF std, where
/// `thread::sleep` yields to FreeRTOS.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// EOF
