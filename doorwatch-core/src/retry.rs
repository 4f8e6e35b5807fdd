//! Bounded retry for the camera/classifier round-trip
//!
//! Only [`CheckError::Transient`] is retried, with a fixed pause between
//! attempts. Anything else returns at once. When the retries run out the
//! last transient error becomes [`CheckError::RetriesExhausted`], which the
//! orchestrator treats as terminal.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::clock::Sleeper;
use crate::config::RetryConf;
use crate::error::CheckError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    pub interval: Duration,
}

impl From<&RetryConf> for RetryPolicy {
    fn from(conf: &RetryConf) -> Self {
        Self { max_retries: conf.max_retries, interval: Duration::from_secs(conf.interval_secs) }
    }
}

/// Runs `op(attempt)` (1-based) until it succeeds, fails terminally or the
/// retry budget is spent.
pub async fn bounded_retry<T, F, Fut>(policy: RetryPolicy, sleeper: &dyn Sleeper, mut op: F) -> Result<T, CheckError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CheckError>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(CheckError::Transient(msg)) => {
                if attempt > policy.max_retries {
                    return Err(CheckError::RetriesExhausted { attempts: attempt, last: msg });
                }
                warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    error = %msg,
                    "service unavailable, retrying in {}s",
                    policy.interval.as_secs()
                );
                sleeper.sleep(policy.interval).await;
                attempt += 1;
            }
            Err(other) => return Err(other),
        }
    }
}
