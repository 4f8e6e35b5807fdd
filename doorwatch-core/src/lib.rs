//! Doorwatch core - decision logic for the garage door watcher
//!
//! This crate holds everything that decides *when* the expensive door check runs:
//! - Per-person presence debouncing, the aggregated presence snapshot and the
//!   polling loop that feeds it
//! - Daily API call budget with local-midnight rollover
//! - Check scheduler (daytime departure trigger + fixed night hours)
//! - Bounded retry over injectable clock/sleep seams
//! - Collaborator ports (probe, camera, classifier, notifier, dataset, presence source)
//!
//! Nothing in the decision path performs I/O; only the ping probe and the
//! adapters living in the binaries touch the network.

pub mod budget;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod error;
pub mod poller;
pub mod ports;
pub mod presence;
pub mod probe;
pub mod retry;
pub mod scheduler;

pub use budget::ApiBudgetGuard;
pub use clock::{Clock, Sleeper, SystemClock, TokioSleeper};
pub use config::{load_config, Entity, WatchConfig};
pub use debounce::{DebounceGate, Observation};
pub use error::{CheckError, ConfigError, NotifyError, PresenceError};
pub use poller::{LocalPresence, PollStats, PresencePoller};
pub use presence::{OverallPresenceSnapshot, PersonStatus, PresenceTracker, SharedTracker};
pub use retry::{bounded_retry, RetryPolicy};
pub use scheduler::{CheckScheduler, Decision};
