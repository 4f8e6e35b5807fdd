//! Collaborator ports
//!
//! Narrow async interfaces for everything the decision core talks to but
//! does not own:
//! - `ReachabilityProbe` : one-shot "is this phone on the LAN"
//! - `PresenceSource`    : debounced household snapshot (status service)
//! - `ImageSource`       : camera still
//! - `Classifier`        : vision model verdict on the still
//! - `Notifier`          : push notification, fire-and-forget
//! - `DatasetSink`       : archive of classified stills
//!
//! Production adapters live in the binaries, fakes in the devkit crate.

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{CheckError, NotifyError, PresenceError};
use crate::presence::OverallPresenceSnapshot;

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Never errors: a probe that cannot run counts as unreachable.
    async fn is_reachable(&self, address: &str) -> bool;
}

#[async_trait]
pub trait PresenceSource: Send + Sync {
    async fn snapshot(&self) -> Result<OverallPresenceSnapshot, PresenceError>;
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, CheckError>;
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, prompt: &str, image: &[u8]) -> Result<DoorStatus, CheckError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait DatasetSink: Send + Sync {
    /// Returns where the image was stored
    async fn archive(&self, label: DoorLabel, image: &[u8], at: DateTime<Tz>) -> std::io::Result<PathBuf>;
}

/// Structured classifier verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorStatus {
    pub is_open: bool,
    pub rationale: String,
}

impl DoorStatus {
    pub fn label(&self) -> DoorLabel {
        if self.is_open { DoorLabel::Open } else { DoorLabel::Closed }
    }
}

/// Dataset class (one sub-directory per label)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorLabel {
    Open,
    Closed,
}

impl DoorLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoorLabel::Open => "open",
            DoorLabel::Closed => "closed",
        }
    }
}

impl fmt::Display for DoorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Min,
    Low,
    Default,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Min => "min",
            Priority::Low => "low",
            Priority::Default => "default",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Image(Vec<u8>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub payload: Payload,
}

impl Notification {
    pub fn door_open(image: Vec<u8>) -> Self {
        Self {
            title: "Garage door is open!".into(),
            priority: Priority::Urgent,
            tags: vec!["warning".into(), "skull".into()],
            payload: Payload::Image(image),
        }
    }

    pub fn door_shut(image: Vec<u8>) -> Self {
        Self {
            title: "garage door is shut".into(),
            priority: Priority::Min,
            tags: vec!["heavy_check_mark".into()],
            payload: Payload::Image(image),
        }
    }

    pub fn check_failed(error: &CheckError) -> Self {
        Self {
            title: "Garage door check failed".into(),
            priority: Priority::High,
            tags: vec!["warning".into()],
            payload: Payload::Text(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_door_status_from_model_json() {
        let status: DoorStatus =
            serde_json::from_str(r#"{"is_open": true, "rationale": "street lights visible"}"#).unwrap();
        assert_eq!(status.label(), DoorLabel::Open);
        assert_eq!(status.label().to_string(), "open");
    }

    #[test]
    fn test_failure_notification_carries_error_text() {
        let n = Notification::check_failed(&CheckError::terminal("camera returned 404"));
        assert_eq!(n.priority, Priority::High);
        assert_eq!(n.payload, Payload::Text("camera returned 404".into()));
    }

    #[test]
    fn test_open_and_shut_notifications() {
        let open = Notification::door_open(vec![1, 2]);
        assert_eq!(open.priority.as_str(), "urgent");
        assert_eq!(open.tags, vec!["warning", "skull"]);
        let shut = Notification::door_shut(vec![]);
        assert_eq!(shut.priority.as_str(), "min");
    }
}
