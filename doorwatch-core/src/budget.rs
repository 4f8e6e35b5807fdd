//! Daily ceiling on classifier calls
//!
//! The day boundary is the local calendar date of whatever timestamp the
//! caller passes in, so the guard itself never reads the clock.

use chrono::NaiveDate;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ApiBudgetGuard {
    max_calls_per_day: u32,
    calls_made_today: u32,
    day_marker: NaiveDate,
}

impl ApiBudgetGuard {
    pub fn new(max_calls_per_day: u32, today: NaiveDate) -> Self {
        Self { max_calls_per_day, calls_made_today: 0, day_marker: today }
    }

    /// Rolls the counter over when `today` is a new day, then checks the ceiling.
    pub fn can_proceed(&mut self, today: NaiveDate) -> bool {
        if today != self.day_marker {
            info!(
                previous = %self.day_marker,
                calls = self.calls_made_today,
                "new day, resetting API call budget"
            );
            self.calls_made_today = 0;
            self.day_marker = today;
        }
        self.calls_made_today < self.max_calls_per_day
    }

    /// Unconditional; pair with [`Self::can_proceed`] or use [`Self::try_acquire`].
    pub fn record_call(&mut self) {
        self.calls_made_today += 1;
    }

    /// Check-and-record in one step
    pub fn try_acquire(&mut self, today: NaiveDate) -> bool {
        if !self.can_proceed(today) {
            return false;
        }
        self.record_call();
        true
    }

    pub fn calls_made_today(&self) -> u32 {
        self.calls_made_today
    }

    pub fn max_calls_per_day(&self) -> u32 {
        self.max_calls_per_day
    }

    pub fn day_marker(&self) -> NaiveDate {
        self.day_marker
    }
}
