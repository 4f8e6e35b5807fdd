//! Household presence state shared between the poller and status readers
//!
//! The tracker owns one [`DebounceGate`] per configured person. The overall
//! view is never stored: [`PresenceTracker::snapshot`] derives it from the
//! gates on every call, so the aggregate cannot drift from the per-person
//! states.

use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::config::Entity;
use crate::debounce::{DebounceGate, Observation};

pub type SharedTracker = Arc<Mutex<PresenceTracker>>;

/// Wire format of `GET /status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallPresenceSnapshot {
    pub someone_home: bool,
    pub people_home: Vec<String>,
    pub last_changed: Option<DateTime<FixedOffset>>,
    pub per_person: BTreeMap<String, PersonStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonStatus {
    pub is_home: bool,
    pub last_changed: Option<DateTime<FixedOffset>>,
}

/// A debounced flip produced by one poll tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceChange {
    pub name: String,
    pub is_home: bool,
}

#[derive(Debug)]
pub struct PresenceTracker {
    people: Vec<(Entity, DebounceGate)>,
    last_overall_change: Option<DateTime<FixedOffset>>,
}

impl PresenceTracker {
    pub fn new(people: &[Entity], debounce: u32) -> Self {
        Self {
            people: people
                .iter()
                .map(|e| (e.clone(), DebounceGate::new(debounce)))
                .collect(),
            last_overall_change: None,
        }
    }

    pub fn shared(self) -> SharedTracker {
        Arc::new(Mutex::new(self))
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.people.iter().map(|(e, _)| e.clone()).collect()
    }

    /// Feeds one raw ping result to a person's gate. `None` for unknown names.
    pub fn observe(&mut self, name: &str, raw_reachable: bool, now: DateTime<FixedOffset>) -> Option<Observation> {
        let (_, gate) = self.people.iter_mut().find(|(e, _)| e.name == name)?;
        let obs = gate.observe(raw_reachable, now);
        if obs.changed {
            self.last_overall_change = Some(now);
        }
        Some(obs)
    }

    /// Applies a whole tick of probe results at once.
    ///
    /// Callers hold the lock for the duration of this call, so readers only
    /// ever see the state before or after the full tick.
    pub fn apply_tick(&mut self, results: &[(String, bool)], now: DateTime<FixedOffset>) -> Vec<PresenceChange> {
        let mut changes = Vec::new();
        for (name, reachable) in results {
            if let Some(obs) = self.observe(name, *reachable, now) {
                if obs.changed {
                    info!(person = %name, is_home = obs.is_home, "presence change");
                    changes.push(PresenceChange { name: name.clone(), is_home: obs.is_home });
                }
            }
        }
        if !changes.is_empty() {
            let snap = self.snapshot();
            info!(
                someone_home = snap.someone_home,
                people = ?snap.people_home,
                "overall presence"
            );
        }
        changes
    }

    pub fn someone_home(&self) -> bool {
        self.people.iter().any(|(_, g)| g.is_home())
    }

    pub fn snapshot(&self) -> OverallPresenceSnapshot {
        let people_home: Vec<String> = self
            .people
            .iter()
            .filter(|(_, g)| g.is_home())
            .map(|(e, _)| e.name.clone())
            .collect();
        let per_person = self
            .people
            .iter()
            .map(|(e, g)| {
                (
                    e.name.clone(),
                    PersonStatus { is_home: g.is_home(), last_changed: g.last_changed() },
                )
            })
            .collect();
        OverallPresenceSnapshot {
            someone_home: !people_home.is_empty(),
            people_home,
            last_changed: self.last_overall_change,
            per_person,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(second: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2025, 6, 1, 12, 0, second).unwrap()
    }

    fn household() -> PresenceTracker {
        PresenceTracker::new(
            &[Entity::new("Tim", "192.168.0.157"), Entity::new("Koi", "192.168.0.110")],
            2,
        )
    }

    fn tick(t: &mut PresenceTracker, tim: bool, koi: bool, s: u32) -> Vec<PresenceChange> {
        t.apply_tick(&[("Tim".into(), tim), ("Koi".into(), koi)], at(s))
    }

    #[test]
    fn test_initial_snapshot_assumes_everyone_home() {
        let snap = household().snapshot();
        assert!(snap.someone_home);
        assert_eq!(snap.people_home, vec!["Tim", "Koi"]);
        assert_eq!(snap.last_changed, None);
        assert!(snap.per_person.values().all(|p| p.is_home && p.last_changed.is_none()));
    }

    #[test]
    fn test_overall_is_or_of_people() {
        let mut t = household();
        tick(&mut t, false, true, 0);
        let changes = tick(&mut t, false, true, 1);
        assert_eq!(changes, vec![PresenceChange { name: "Tim".into(), is_home: false }]);

        let snap = t.snapshot();
        assert!(snap.someone_home);
        assert_eq!(snap.people_home, vec!["Koi"]);
        assert_eq!(snap.last_changed, Some(at(1)));
        assert_eq!(snap.per_person["Tim"].last_changed, Some(at(1)));
        assert_eq!(snap.per_person["Koi"].last_changed, None);

        tick(&mut t, false, false, 2);
        tick(&mut t, false, false, 3);
        let snap = t.snapshot();
        assert!(!snap.someone_home);
        assert!(snap.people_home.is_empty());
        assert_eq!(snap.last_changed, Some(at(3)));
    }

    #[test]
    fn test_unknown_person_is_ignored() {
        let mut t = household();
        assert!(t.observe("Mallory", false, at(0)).is_none());
        assert!(t.apply_tick(&[("Mallory".into(), false)], at(1)).is_empty());
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut t = household();
        tick(&mut t, false, true, 0);
        tick(&mut t, false, true, 1);
        let json = serde_json::to_value(t.snapshot()).unwrap();
        assert_eq!(json["someone_home"], true);
        assert_eq!(json["people_home"], serde_json::json!(["Koi"]));
        assert_eq!(json["per_person"]["Tim"]["is_home"], false);
        assert_eq!(json["per_person"]["Koi"]["last_changed"], serde_json::Value::Null);
        assert!(json["last_changed"].as_str().unwrap().starts_with("2025-06-01T12:00:01"));

        let back: OverallPresenceSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, t.snapshot());
    }
}
