//! Source of "now" for layout and the live view.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::model::Timestamp;

/// Supplies the current instant.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current wall time in `tz`, the frame all model timestamps use.
    fn now_in(&self, tz: &Tz) -> Timestamp {
        self.now_utc().with_timezone(tz).naive_local()
    }
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now = *now + by;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_in_converts_to_wall_time() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap());
        let berlin: Tz = "Europe/Berlin".parse().unwrap();
        assert_eq!(clock.now_in(&berlin).to_string(), "2024-07-01 14:00:00");
        assert_eq!(clock.now_in(&Tz::UTC).to_string(), "2024-07-01 12:00:00");
    }

    #[test]
    fn test_fixed_clock_advances_shared_state() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap());
        let shared = clock.clone();
        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(shared.now_utc(), Utc.with_ymd_and_hms(2024, 7, 1, 12, 5, 0).unwrap());
    }
}
