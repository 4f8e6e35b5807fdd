//! Presence lookup for the scheduler
//!
//! Primary source is the presence service (`GET /status`) or the in-process
//! tracker. When it cannot be read the agent pings everybody itself and ORs
//! the raw results, with no debouncing.

use async_trait::async_trait;
use doorwatch_core::error::PresenceError;
use doorwatch_core::ports::{PresenceSource, ReachabilityProbe};
use doorwatch_core::presence::OverallPresenceSnapshot;
use doorwatch_core::probe::anyone_reachable;
use doorwatch_core::Entity;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Client of the presence service status endpoint
pub struct HttpPresence {
    client: reqwest::Client,
    url: String,
}

impl HttpPresence {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl PresenceSource for HttpPresence {
    async fn snapshot(&self) -> Result<OverallPresenceSnapshot, PresenceError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PresenceError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PresenceError::BadResponse(format!("HTTP {status}")));
        }
        resp.json::<OverallPresenceSnapshot>()
            .await
            .map_err(|e| PresenceError::BadResponse(e.to_string()))
    }
}

/// Primary source with direct probing as the degraded path
pub struct FallbackPresence {
    primary: Arc<dyn PresenceSource>,
    probe: Arc<dyn ReachabilityProbe>,
    people: Vec<Entity>,
}

impl FallbackPresence {
    pub fn new(primary: Arc<dyn PresenceSource>, probe: Arc<dyn ReachabilityProbe>, people: Vec<Entity>) -> Self {
        Self { primary, probe, people }
    }

    /// Never fails: errors from the primary source trigger the fallback.
    pub async fn is_anyone_home(&self) -> bool {
        match self.primary.snapshot().await {
            Ok(snapshot) => {
                debug!(people_home = ?snapshot.people_home, "presence from status source");
                snapshot.someone_home
            }
            Err(e) => {
                warn!(error = %e, "presence status unavailable, probing phones directly");
                anyone_reachable(self.probe.as_ref(), &self.people).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorwatch_devkit::{ScriptedProbe, StaticPresence};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn people() -> Vec<Entity> {
        vec![Entity::new("Tim", "192.168.0.157"), Entity::new("Koi", "192.168.0.110")]
    }

    #[tokio::test]
    async fn test_reads_status_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "someone_home": true,
                "people_home": ["Koi"],
                "last_changed": "2025-08-01T09:30:00-07:00",
                "per_person": {
                    "Koi": {"is_home": true, "last_changed": null},
                    "Tim": {"is_home": false, "last_changed": "2025-08-01T09:30:00-07:00"}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpPresence::new(format!("{}/status", server.uri()), STATUS_TIMEOUT).unwrap();
        let snap = client.snapshot().await.unwrap();
        assert!(snap.someone_home);
        assert_eq!(snap.people_home, vec!["Koi"]);
        assert!(!snap.per_person["Tim"].is_home);
        assert!(snap.last_changed.is_some());
    }

    #[tokio::test]
    async fn test_server_error_is_bad_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = HttpPresence::new(format!("{}/status", server.uri()), STATUS_TIMEOUT).unwrap();
        assert!(matches!(client.snapshot().await, Err(PresenceError::BadResponse(_))));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        let client = HttpPresence::new("http://127.0.0.1:1/status", STATUS_TIMEOUT).unwrap();
        assert!(matches!(client.snapshot().await, Err(PresenceError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_primary_answer_skips_probes() {
        let probe = ScriptedProbe::new();
        let presence = FallbackPresence::new(
            Arc::new(StaticPresence::home(&[], &["Tim", "Koi"])),
            Arc::new(probe.clone()),
            people(),
        );
        assert!(!presence.is_anyone_home().await);
        assert!(probe.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_ors_raw_probes() {
        let probe = ScriptedProbe::new();
        probe.set("192.168.0.110", true);
        let source = StaticPresence::unreachable();
        let presence = FallbackPresence::new(Arc::new(source.clone()), Arc::new(probe.clone()), people());

        assert!(presence.is_anyone_home().await);
        assert_eq!(probe.calls().len(), 2);

        probe.set("192.168.0.110", false);
        assert!(!presence.is_anyone_home().await);

        // back online: status wins again
        source.set(&["Tim"], &[]);
        assert!(presence.is_anyone_home().await);
        assert_eq!(probe.calls().len(), 4);
    }
}
