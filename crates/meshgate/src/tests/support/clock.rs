use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::readiness::Clock;

/// Virtual clock: sleeping advances time instantly.
pub(crate) struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Virtual time slept so far.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().expect("clock mutex poisoned")
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        let mut offset = self.offset.lock().expect("clock mutex poisoned");
        *offset += duration;
    }
}
