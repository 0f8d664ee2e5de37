// crates/llq-sim/src/clock.rs

use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use llq_core::Clock;

/// A clock that only moves when told to.
///
/// Injected wherever the core takes a `Clock` so timeout and decay behavior
/// is reproducible across test runs.
pub struct SimulationClock {
    now: RwLock<DateTime<Utc>>,
}

impl SimulationClock {
    /// Start at a fixed, arbitrary epoch so timestamps are stable.
    pub fn new() -> Self {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        SimulationClock {
            now: RwLock::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.write().expect("clock lock poisoned");
        *now += chrono::Duration::from_std(delta).unwrap_or(chrono::Duration::zero());
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimulationClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_stands_still() {
        let clock = SimulationClock::new();
        let a = clock.now();
        let b = clock.now();
        assert_eq!(a, b);
    }

    #[test]
    fn test_advance_moves_time() {
        let clock = SimulationClock::new();
        let before = clock.now();
        clock.advance(Duration::from_secs(3001));
        let after = clock.now();
        assert_eq!((after - before).num_seconds(), 3001);
    }
}
