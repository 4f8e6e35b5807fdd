/*!
Stubs des collaborateurs externes pour tests sans réseau

Chaque stub implémente un port de `doorwatch_core::ports` :
- réponses scriptées (file FIFO, puis valeur par défaut)
- enregistrement de tous les appels pour les assertions
*/

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use doorwatch_core::error::{CheckError, NotifyError, PresenceError};
use doorwatch_core::ports::{
    Classifier, DatasetSink, DoorLabel, DoorStatus, ImageSource, Notification, Notifier, PresenceSource,
    ReachabilityProbe,
};
use doorwatch_core::presence::{OverallPresenceSnapshot, PersonStatus};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

/// Image JPEG minimale (SOI + EOI) servie par défaut par [`StubCamera`]
pub const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xD9];

/// Probe scriptée par adresse : file de réponses puis valeur par défaut
#[derive(Clone, Default)]
pub struct ScriptedProbe {
    scripts: Arc<Mutex<HashMap<String, VecDeque<bool>>>>,
    defaults: Arc<Mutex<HashMap<String, bool>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Réponse permanente pour une adresse
    pub fn set(&self, address: &str, reachable: bool) -> &Self {
        self.defaults.lock().insert(address.to_string(), reachable);
        self
    }

    /// Réponses successives pour une adresse (consommées une par appel)
    pub fn script(&self, address: &str, answers: &[bool]) -> &Self {
        self.scripts
            .lock()
            .entry(address.to_string())
            .or_default()
            .extend(answers.iter().copied());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn is_reachable(&self, address: &str) -> bool {
        self.calls.lock().push(address.to_string());
        if let Some(answer) = self.scripts.lock().get_mut(address).and_then(|q| q.pop_front()) {
            return answer;
        }
        self.defaults.lock().get(address).copied().unwrap_or(false)
    }
}

/// Source de présence figée, ou indisponible
#[derive(Clone)]
pub struct StaticPresence {
    snapshot: Arc<Mutex<Option<OverallPresenceSnapshot>>>,
    reads: Arc<Mutex<usize>>,
}

impl StaticPresence {
    pub fn home(people_home: &[&str], people_away: &[&str]) -> Self {
        Self {
            snapshot: Arc::new(Mutex::new(Some(snapshot_of(people_home, people_away)))),
            reads: Arc::new(Mutex::new(0)),
        }
    }

    /// Simule un service de statut injoignable
    pub fn unreachable() -> Self {
        Self { snapshot: Arc::new(Mutex::new(None)), reads: Arc::new(Mutex::new(0)) }
    }

    pub fn set(&self, people_home: &[&str], people_away: &[&str]) {
        *self.snapshot.lock() = Some(snapshot_of(people_home, people_away));
    }

    pub fn go_down(&self) {
        *self.snapshot.lock() = None;
    }

    pub fn reads(&self) -> usize {
        *self.reads.lock()
    }
}

#[async_trait]
impl PresenceSource for StaticPresence {
    async fn snapshot(&self) -> Result<OverallPresenceSnapshot, PresenceError> {
        *self.reads.lock() += 1;
        self.snapshot
            .lock()
            .clone()
            .ok_or_else(|| PresenceError::Unreachable("stub presence is down".into()))
    }
}

/// Construit un snapshot cohérent (OR des présences)
pub fn snapshot_of(people_home: &[&str], people_away: &[&str]) -> OverallPresenceSnapshot {
    let mut per_person = BTreeMap::new();
    for name in people_home {
        per_person.insert(name.to_string(), PersonStatus { is_home: true, last_changed: None });
    }
    for name in people_away {
        per_person.insert(name.to_string(), PersonStatus { is_home: false, last_changed: None });
    }
    OverallPresenceSnapshot {
        someone_home: !people_home.is_empty(),
        people_home: people_home.iter().map(|s| s.to_string()).collect(),
        last_changed: None,
        per_person,
    }
}

/// Caméra scriptée : résultats en file, puis [`FAKE_JPEG`]
#[derive(Clone, Default)]
pub struct StubCamera {
    script: Arc<Mutex<VecDeque<Result<Vec<u8>, CheckError>>>>,
    fetches: Arc<Mutex<usize>>,
}

impl StubCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, result: Result<Vec<u8>, CheckError>) -> &Self {
        self.script.lock().push_back(result);
        self
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock()
    }
}

#[async_trait]
impl ImageSource for StubCamera {
    async fn fetch(&self) -> Result<Vec<u8>, CheckError> {
        *self.fetches.lock() += 1;
        self.script.lock().pop_front().unwrap_or_else(|| Ok(FAKE_JPEG.to_vec()))
    }
}

/// Classifieur scripté : résultats en file, puis verdict par défaut
#[derive(Clone)]
pub struct ScriptedClassifier {
    script: Arc<Mutex<VecDeque<Result<DoorStatus, CheckError>>>>,
    default: DoorStatus,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedClassifier {
    pub fn always(is_open: bool) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default: DoorStatus { is_open, rationale: "stub verdict".into() },
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, result: Result<DoorStatus, CheckError>) -> &Self {
        self.script.lock().push_back(result);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, prompt: &str, _image: &[u8]) -> Result<DoorStatus, CheckError> {
        self.prompts.lock().push(prompt.to_string());
        self.script.lock().pop_front().unwrap_or_else(|| Ok(self.default.clone()))
    }
}

/// Enregistre les notifications envoyées ; peut simuler une panne ntfy
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().iter().map(|n| n.title.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        if *self.failing.lock() {
            return Err(NotifyError("stub notifier is down".into()));
        }
        self.sent.lock().push(notification);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedImage {
    pub label: DoorLabel,
    pub bytes: usize,
    pub at: DateTime<Tz>,
}

/// Dataset en mémoire
#[derive(Clone, Default)]
pub struct MemoryDataset {
    entries: Arc<Mutex<Vec<ArchivedImage>>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ArchivedImage> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl DatasetSink for MemoryDataset {
    async fn archive(&self, label: DoorLabel, image: &[u8], at: DateTime<Tz>) -> std::io::Result<PathBuf> {
        self.entries.lock().push(ArchivedImage { label, bytes: image.len(), at });
        Ok(PathBuf::from(format!("memory/{}/{}.jpg", label, at.format("%Y%m%d_%H%M%S"))))
    }
}
