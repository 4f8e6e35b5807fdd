//! Per-person hysteresis over raw ping results
//!
//! A phone that sleeps or roams between access points drops pings for a
//! while. The gate only flips its stable state after `threshold`
//! *consecutive* raw observations disagree with it; one agreeing
//! observation cancels the progress.
//!
//! ```text
//!            raw != state (count < N-1)
//!          ┌──────────────┐
//!          ▼              │
//!   Stable(home) ── raw == state ──► count = 0
//!          │
//!          └── raw != state, count reaches N ──► Stable(!home), count = 0
//! ```

use chrono::{DateTime, FixedOffset};

/// Result of [`DebounceGate::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub is_home: bool,
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct DebounceGate {
    threshold: u32,
    is_home: bool,
    consecutive_mismatch: u32,
    last_changed: Option<DateTime<FixedOffset>>,
}

impl DebounceGate {
    /// Starts as "home" so that the first debounced departure after boot is
    /// reported as a change.
    pub fn new(threshold: u32) -> Self {
        Self::with_state(threshold, true)
    }

    pub fn with_state(threshold: u32, is_home: bool) -> Self {
        Self {
            threshold: threshold.max(1),
            is_home,
            consecutive_mismatch: 0,
            last_changed: None,
        }
    }

    pub fn observe(&mut self, raw_reachable: bool, now: DateTime<FixedOffset>) -> Observation {
        if raw_reachable == self.is_home {
            self.consecutive_mismatch = 0;
            return Observation { is_home: self.is_home, changed: false };
        }

        self.consecutive_mismatch += 1;
        if self.consecutive_mismatch >= self.threshold {
            self.is_home = raw_reachable;
            self.last_changed = Some(now);
            self.consecutive_mismatch = 0;
            return Observation { is_home: self.is_home, changed: true };
        }
        Observation { is_home: self.is_home, changed: false }
    }

    pub fn is_home(&self) -> bool {
        self.is_home
    }

    pub fn last_changed(&self) -> Option<DateTime<FixedOffset>> {
        self.last_changed
    }

    pub fn consecutive_mismatch(&self) -> u32 {
        self.consecutive_mismatch
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
