//! Time source used by quota rollover, dictionary timestamps and the report scheduler.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Anything that can tell the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC day as `YYYY-MM-DD` (the format stored in `lastRequestDate`).
    fn today(&self) -> String {
        self.now().format("%Y-%m-%d").to_string()
    }

    /// Current UTC month as `YYYY-MM` (the format stored in `lastResetDate`).
    fn current_month(&self) -> String {
        self.now().format("%Y-%m").to_string()
    }
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_and_month_strings() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 9, 23, 59, 0).unwrap());
        assert_eq!(clock.today(), "2025-03-09");
        assert_eq!(clock.current_month(), "2025-03");
    }

    #[test]
    fn test_fixed_clock_can_advance() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap());
        clock.set(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(clock.current_month(), "2025-02");
    }
}
