use doorwatch_core::poller::PollStats;
use doorwatch_core::presence::SharedTracker;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize)]
pub struct PresenceHealth {
    pub uptime_seconds: u64,
    pub people_tracked: u32,
    pub someone_home: bool,
    pub poll_ticks: u64,
    pub failed_ticks: u64,
    pub presence_flips: u64,
    pub memory_usage_mb: f32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    stats: Arc<PollStats>,
}

impl HealthTracker {
    pub fn new(stats: Arc<PollStats>) -> Self {
        Self { start_time: Instant::now(), stats }
    }

    pub fn get_health(&self, tracker: &SharedTracker) -> PresenceHealth {
        // une seule prise du lock pour une vue cohérente
        let (people_tracked, someone_home) = {
            let t = tracker.lock();
            (t.entities().len() as u32, t.someone_home())
        };

        PresenceHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            people_tracked,
            someone_home,
            poll_ticks: self.stats.ticks.load(Ordering::Relaxed),
            failed_ticks: self.stats.failed_ticks.load(Ordering::Relaxed),
            presence_flips: self.stats.flips.load(Ordering::Relaxed),
            memory_usage_mb: get_memory_usage_mb(),
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("VmRSS:") {
                    if let Some(kb) = rest.split_whitespace().next().and_then(|s| s.parse::<u64>().ok()) {
                        return (kb as f32) / 1024.0; // KB -> MB
                    }
                }
            }
        }
    }

    // Pas de /proc : valeur inconnue
    0.0
}
