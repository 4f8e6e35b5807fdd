//! Decides when the door check should run
//!
//! Two regimes, selected by local wall-clock time:
//!
//! - **Daytime** (`daytime.start ..= daytime.end`): edge trigger. A check
//!   fires on the home -> away transition only; staying away, coming back
//!   or staying home never fires.
//! - **Night**: fixed hours. Each configured hour fires at most once per
//!   diurnal cycle, whoever is home.
//!
//! The completed-hours set is cleared on the first tick that falls in the
//! daytime start hour. `was_home_last_tick` starts `true`, so booting into
//! an empty house during the day counts as a departure.

use chrono::{NaiveTime, Timelike};
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::DaytimeWindow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub should_check: bool,
    pub reason: String,
}

impl Decision {
    fn fire(reason: impl Into<String>) -> Self {
        Self { should_check: true, reason: reason.into() }
    }

    fn skip(reason: impl Into<String>) -> Self {
        Self { should_check: false, reason: reason.into() }
    }
}

#[derive(Debug, Clone)]
pub struct CheckScheduler {
    daytime: DaytimeWindow,
    night_check_hours: BTreeSet<u32>,
    was_home_last_tick: bool,
    completed_night_hours: BTreeSet<u32>,
}

impl CheckScheduler {
    pub fn new(daytime: DaytimeWindow, night_check_hours: impl IntoIterator<Item = u32>) -> Self {
        Self {
            daytime,
            night_check_hours: night_check_hours.into_iter().collect(),
            was_home_last_tick: true,
            completed_night_hours: BTreeSet::new(),
        }
    }

    /// `now` is local wall-clock time in the configured timezone.
    pub fn decide(&mut self, now_home: bool, now: NaiveTime) -> Decision {
        let hour = now.hour();

        if hour == self.daytime.start.hour() && !self.completed_night_hours.is_empty() {
            debug!(completed = ?self.completed_night_hours, "new day, clearing night checks");
            self.completed_night_hours.clear();
        }

        if self.daytime.contains(now) {
            let was_home = self.was_home_last_tick;
            self.was_home_last_tick = now_home;
            return match (was_home, now_home) {
                (true, false) => Decision::fire("everyone left home during the day"),
                (false, false) => Decision::skip("still away, already checked"),
                (false, true) => Decision::skip("someone came back home"),
                (true, true) => Decision::skip("someone is home"),
            };
        }

        self.was_home_last_tick = now_home;
        if !self.night_check_hours.contains(&hour) {
            return Decision::skip("night, no check scheduled this hour");
        }
        if self.completed_night_hours.insert(hour) {
            Decision::fire(format!("scheduled night check for {hour:02}:00"))
        } else {
            Decision::skip(format!("night check for {hour:02}:00 already done"))
        }
    }

    pub fn was_home_last_tick(&self) -> bool {
        self.was_home_last_tick
    }

    pub fn completed_night_hours(&self) -> &BTreeSet<u32> {
        &self.completed_night_hours
    }
}
