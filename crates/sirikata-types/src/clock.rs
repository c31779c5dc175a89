//! Maps wall-clock elapsed time onto [`Time`] (§3's "monotonic
//! simulation time"). Every process that needs `Time::now()` holds one
//! `Clock`, constructed once at startup so all its `Time` values share
//! an epoch.

use crate::Time;
use std::time::Instant;

#[derive(Clone, Copy, Debug)]
pub struct Clock {
    epoch: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }

    pub fn now(&self) -> Time {
        Time::from_seconds(self.epoch.elapsed().as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_advances_monotonically() {
        let clock = Clock::new();
        let first = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = clock.now();
        assert!(second > first);
    }
}
