//! Presence polling loop
//!
//! Each tick pings every person concurrently *without* holding the lock,
//! then applies all results in one critical section. A status reader
//! therefore waits at most for `apply_tick`, never for a ping.

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::clock::Clock;
use crate::config::Entity;
use crate::error::PresenceError;
use crate::ports::{PresenceSource, ReachabilityProbe};
use crate::presence::{OverallPresenceSnapshot, PresenceChange, SharedTracker};
use crate::probe::probe_all;

/// Counters for `/system/health`
#[derive(Debug, Default)]
pub struct PollStats {
    pub ticks: AtomicU64,
    pub failed_ticks: AtomicU64,
    pub flips: AtomicU64,
}

pub struct PresencePoller {
    tracker: SharedTracker,
    probe: Arc<dyn ReachabilityProbe>,
    clock: Arc<dyn Clock>,
    entities: Vec<Entity>,
    stats: Arc<PollStats>,
}

impl PresencePoller {
    pub fn new(tracker: SharedTracker, probe: Arc<dyn ReachabilityProbe>, clock: Arc<dyn Clock>) -> Self {
        let entities = tracker.lock().entities();
        Self { tracker, probe, clock, entities, stats: Arc::new(PollStats::default()) }
    }

    pub fn stats(&self) -> Arc<PollStats> {
        self.stats.clone()
    }

    pub async fn poll_once(&self) -> Vec<PresenceChange> {
        let results = probe_all(self.probe.as_ref(), &self.entities).await;
        let now: DateTime<Tz> = self.clock.now();
        let changes = self.tracker.lock().apply_tick(&results, now.fixed_offset());
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);
        self.stats.flips.fetch_add(changes.len() as u64, Ordering::Relaxed);
        changes
    }

    /// Runs forever on its own task. A panicking tick is logged and the
    /// next one runs on schedule.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        let poller = Arc::new(self);
        tokio::spawn(async move {
            info!(
                people = ?poller.entities.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
                interval_secs = interval.as_secs(),
                "presence poller started"
            );
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let tick = poller.clone();
                if let Err(e) = tokio::spawn(async move { tick.poll_once().await }).await {
                    poller.stats.failed_ticks.fetch_add(1, Ordering::Relaxed);
                    error!(error = %e, "presence tick failed");
                }
            }
        })
    }
}

/// In-process [`PresenceSource`] reading the tracker directly
#[derive(Clone)]
pub struct LocalPresence {
    tracker: SharedTracker,
}

impl LocalPresence {
    pub fn new(tracker: SharedTracker) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl PresenceSource for LocalPresence {
    async fn snapshot(&self) -> Result<OverallPresenceSnapshot, PresenceError> {
        Ok(self.tracker.lock().snapshot())
    }
}
