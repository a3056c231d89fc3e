//! Simulated session time
//!
//! Time only advances in fixed ticks, so wall-clock jitter in the driver never
//! reaches the physics.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Virtual clock anchored to a wall-clock epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionClock {
    /// Session time zero
    pub epoch: DateTime<Utc>,
    pub tick: u64,
    pub elapsed_ms: u64,
}

impl SessionClock {
    pub fn new(epoch: DateTime<Utc>) -> Self {
        Self {
            epoch,
            tick: 0,
            elapsed_ms: 0,
        }
    }

    pub fn timestamp_at(&self, elapsed_ms: u64) -> DateTime<Utc> {
        self.epoch + Duration::milliseconds(elapsed_ms as i64)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.timestamp_at(self.elapsed_ms)
    }

    /// Advance by one tick and describe it
    pub fn advance(&mut self, dt_ms: u64, seed: u64) -> TickContext {
        self.tick += 1;
        self.elapsed_ms += dt_ms;
        TickContext {
            seed,
            tick: self.tick,
            dt_ms,
            now_ms: self.elapsed_ms,
            timestamp: self.now(),
        }
    }
}

/// Everything a component needs to know about the tick being computed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub seed: u64,
    pub tick: u64,
    pub dt_ms: u64,
    /// Session time at the end of this tick
    pub now_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl TickContext {
    pub fn dt_secs(&self) -> f64 {
        self.dt_ms as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_advance_is_fixed_step() {
        let epoch = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut clock = SessionClock::new(epoch);

        let first = clock.advance(50, 1);
        let second = clock.advance(50, 1);

        assert_eq!(first.tick, 1);
        assert_eq!(first.now_ms, 50);
        assert_eq!(second.now_ms, 100);
        assert_eq!(second.timestamp, epoch + Duration::milliseconds(100));
        assert_eq!(second.dt_secs(), 0.05);
        assert_eq!(clock.now(), second.timestamp);
    }
}
