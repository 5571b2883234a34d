//! Time abstractions.
//!
//! Every clock read in the core goes through the [`Clock`] trait instead of
//! calling `chrono::Utc::now()` directly, so replay-window and rate-limit
//! logic can be driven deterministically in tests.

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock with a settable instant, for deterministic tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: std::sync::Arc<std::sync::Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: std::sync::Arc::new(std::sync::Mutex::new(instant)),
        }
    }

    /// Advance the clock by the given number of seconds.
    pub fn advance_secs(&self, secs: i64) {
        let mut guard = self.instant.lock().expect("fixed clock mutex poisoned");
        *guard += chrono::Duration::seconds(secs);
    }

    /// Set the clock to an arbitrary instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock().expect("fixed clock mutex poisoned") = instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().expect("fixed clock mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let start = Utc::now();
        let clock = FixedClock::new(start);
        clock.advance_secs(60);
        assert_eq!(clock.now(), start + chrono::Duration::seconds(60));
    }
}
