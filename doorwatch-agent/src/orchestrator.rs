//! One door check: still -> verdict -> archive -> push
//!
//! Fetch and classify are retried together as a unit under the retry policy.
//! A terminal failure becomes a "check failed" push. Archive and notifier
//! failures are logged and never change the cycle outcome.

use chrono::DateTime;
use chrono_tz::Tz;
use doorwatch_core::ports::{Classifier, DatasetSink, DoorStatus, ImageSource, Notification, Notifier};
use doorwatch_core::{bounded_retry, CheckError, Clock, RetryPolicy, Sleeper};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Everything a cycle talks to
pub struct Collaborators {
    pub camera: Arc<dyn ImageSource>,
    pub classifier: Arc<dyn Classifier>,
    pub notifier: Arc<dyn Notifier>,
    pub dataset: Arc<dyn DatasetSink>,
    pub clock: Arc<dyn Clock>,
    pub sleeper: Arc<dyn Sleeper>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Classified { status: DoorStatus, archived: Option<PathBuf> },
    Failed(CheckError),
}

pub struct CheckOrchestrator {
    io: Collaborators,
    policy: RetryPolicy,
    prompt: String,
    notify_when_shut: bool,
}

impl CheckOrchestrator {
    pub fn new(io: Collaborators, policy: RetryPolicy, prompt: impl Into<String>, notify_when_shut: bool) -> Self {
        Self { io, policy, prompt: prompt.into(), notify_when_shut }
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        let attempt = bounded_retry(self.policy, self.io.sleeper.as_ref(), |attempt| async move {
            debug!(attempt, "fetching camera still");
            let image = self.io.camera.fetch().await?;
            let status = self.io.classifier.classify(&self.prompt, &image).await?;
            Ok((image, status))
        })
        .await;

        match attempt {
            Ok((image, status)) => {
                info!(is_open = status.is_open, rationale = %status.rationale, "door checked");
                let archived = self.archive(&status, &image, self.io.clock.now()).await;
                if status.is_open {
                    self.push(Notification::door_open(image)).await;
                } else if self.notify_when_shut {
                    self.push(Notification::door_shut(image)).await;
                }
                CycleOutcome::Classified { status, archived }
            }
            Err(e) => {
                error!(error = %e, "door check failed");
                self.push(Notification::check_failed(&e)).await;
                CycleOutcome::Failed(e)
            }
        }
    }

    async fn archive(&self, status: &DoorStatus, image: &[u8], at: DateTime<Tz>) -> Option<PathBuf> {
        match self.io.dataset.archive(status.label(), image, at).await {
            Ok(path) => {
                info!(path = %path.display(), label = %status.label(), "still archived");
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "could not archive still");
                None
            }
        }
    }

    async fn push(&self, notification: Notification) {
        let title = notification.title.clone();
        if let Err(e) = self.io.notifier.notify(notification).await {
            warn!(error = %e, title = %title, "notification not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorwatch_core::ports::{DoorLabel, Payload, Priority};
    use doorwatch_devkit::{local, ScriptedClassifier, TestHarness};
    use std::time::Duration;

    fn orchestrator(h: &TestHarness, max_retries: u32, when_shut: bool) -> CheckOrchestrator {
        CheckOrchestrator::new(
            Collaborators {
                camera: Arc::new(h.camera.clone()),
                classifier: Arc::new(h.classifier.clone()),
                notifier: Arc::new(h.notifier.clone()),
                dataset: Arc::new(h.dataset.clone()),
                clock: Arc::new(h.clock.clone()),
                sleeper: Arc::new(h.sleeper.clone()),
            },
            RetryPolicy { max_retries, interval: Duration::from_secs(60) },
            "Is the door open or closed?",
            when_shut,
        )
    }

    #[tokio::test]
    async fn test_open_door_is_archived_and_pushed_urgent() {
        let h = TestHarness::new(local(2025, 8, 1, 22, 0)).with_classifier(ScriptedClassifier::always(true));
        let outcome = orchestrator(&h, 15, false).run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Classified { ref status, archived: Some(_) } if status.is_open));
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].priority, Priority::Urgent);
        assert_eq!(sent[0].tags, vec!["warning", "skull"]);
        assert!(matches!(sent[0].payload, Payload::Image(_)));

        let entries = h.dataset.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, DoorLabel::Open);
        assert_eq!(entries[0].at, local(2025, 8, 1, 22, 0));
        assert_eq!(h.classifier.prompts(), vec!["Is the door open or closed?"]);
    }

    #[tokio::test]
    async fn test_shut_door_pushes_only_when_enabled() {
        let h = TestHarness::new(local(2025, 8, 1, 22, 0));
        orchestrator(&h, 15, false).run_cycle().await;
        assert!(h.notifier.sent().is_empty());
        assert_eq!(h.archived(), 1);

        orchestrator(&h, 15, true).run_cycle().await;
        h.assert_notified("garage door is shut").unwrap();
        assert_eq!(h.notifier.sent()[0].priority, Priority::Min);
    }

    #[tokio::test]
    async fn test_transient_camera_failures_are_retried() {
        let h = TestHarness::new(local(2025, 8, 1, 10, 0));
        h.camera
            .push(Err(CheckError::transient("camera returned 503")))
            .push(Err(CheckError::transient("camera returned 503")));

        let outcome = orchestrator(&h, 15, true).run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::Classified { .. }));
        assert_eq!(h.camera.fetches(), 3);
        assert_eq!(h.classifier.calls(), 1);
        assert_eq!(h.sleeper.sleeps(), vec![Duration::from_secs(60); 2]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_push_failure_and_skip_archive() {
        let h = TestHarness::new(local(2025, 8, 1, 10, 0));
        h.classifier
            .push(Err(CheckError::transient("model overloaded")))
            .push(Err(CheckError::transient("model overloaded")))
            .push(Err(CheckError::transient("model overloaded")));

        let outcome = orchestrator(&h, 2, true).run_cycle().await;
        assert_eq!(
            outcome,
            CycleOutcome::Failed(CheckError::RetriesExhausted { attempts: 3, last: "model overloaded".into() })
        );
        assert_eq!(h.archived(), 0);
        h.assert_notified("Garage door check failed").unwrap();
        let sent = h.notifier.sent();
        assert_eq!(sent[0].priority, Priority::High);
        assert!(matches!(&sent[0].payload, Payload::Text(t) if t.contains("model overloaded")));
    }

    #[tokio::test]
    async fn test_terminal_failure_is_not_retried() {
        let h = TestHarness::new(local(2025, 8, 1, 10, 0));
        h.camera.push(Err(CheckError::terminal("camera returned 404 Not Found")));

        let outcome = orchestrator(&h, 15, true).run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::Failed(CheckError::Terminal(_))));
        assert_eq!(h.camera.fetches(), 1);
        assert!(h.sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_notifier_outage_does_not_change_outcome() {
        let h = TestHarness::new(local(2025, 8, 1, 22, 0)).with_classifier(ScriptedClassifier::always(true));
        h.notifier.fail(true);

        let outcome = orchestrator(&h, 15, true).run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::Classified { .. }));
        assert_eq!(h.archived(), 1);
    }
}
