//! Minimum spacing between calls to one upstream

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Blocks callers until `delay` has passed since the previous call.
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleep out whatever is left of the delay, then mark a new call.
    pub fn wait(&self) {
        let mut last = self.last_call.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = *last {
            let since = prev.elapsed();
            if since < self.delay {
                std::thread::sleep(self.delay - since);
            }
        }
        *last = Some(Instant::now());
    }
}
