//! ICMP reachability via the system `ping` binary

use async_trait::async_trait;
use futures::future::join_all;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::config::Entity;
use crate::ports::ReachabilityProbe;

/// Slack on top of the ping deadline for process spawn/teardown
const SPAWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct PingProbe {
    program: String,
    timeout: Duration,
}

impl PingProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { program: "ping".into(), timeout }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, address: &str) -> Vec<String> {
        let secs = self.timeout.as_secs().max(1).to_string();
        let millis = self.timeout.as_millis().max(1).to_string();
        if cfg!(target_os = "windows") {
            vec!["-n".into(), "1".into(), "-w".into(), millis, address.into()]
        } else if cfg!(target_os = "macos") {
            vec!["-c".into(), "1".into(), "-W".into(), millis, address.into()]
        } else {
            vec!["-c".into(), "1".into(), "-W".into(), secs, address.into()]
        }
    }
}

#[async_trait]
impl ReachabilityProbe for PingProbe {
    async fn is_reachable(&self, address: &str) -> bool {
        let status = tokio::time::timeout(
            self.timeout + SPAWN_GRACE,
            AsyncCommand::new(&self.program)
                .args(self.args(address))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await;

        match status {
            Ok(Ok(s)) => s.success(),
            Ok(Err(e)) => {
                debug!(address, error = %e, "ping could not run");
                false
            }
            Err(_) => {
                debug!(address, "ping timed out");
                false
            }
        }
    }
}

/// Probes every entity concurrently; results keep the entity order.
pub async fn probe_all(probe: &dyn ReachabilityProbe, entities: &[Entity]) -> Vec<(String, bool)> {
    let results = join_all(entities.iter().map(|e| probe.is_reachable(&e.address))).await;
    entities
        .iter()
        .zip(results)
        .map(|(e, ok)| (e.name.clone(), ok))
        .collect()
}

/// Undebounced OR over direct probes, used when the status service is down
pub async fn anyone_reachable(probe: &dyn ReachabilityProbe, entities: &[Entity]) -> bool {
    probe_all(probe, entities).await.into_iter().any(|(_, ok)| ok)
}
