/*!
Test Harness pour les cycles de vérification doorwatch

Facilite l'écriture de tests avec:
- Horloge manuelle (fuseau configuré) et sleeper sans attente réelle
- Tous les collaborateurs stubés et partagés (Arc) entre le test et le code testé
- Assertions sur les notifications et le dataset
*/

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone};
use chrono_tz::Tz;
use doorwatch_core::clock::{Clock, Sleeper};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::stubs::{MemoryDataset, RecordingNotifier, ScriptedClassifier, ScriptedProbe, StubCamera};

/// Fuseau des tests (celui du déploiement d'origine)
pub const TEST_TZ: Tz = chrono_tz::America::Los_Angeles;

/// Date/heure locale dans [`TEST_TZ`]
pub fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
    TEST_TZ
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .earliest()
        .unwrap_or_else(|| panic!("non-existent local time {y}-{m}-{d} {h}:{min}"))
}

/// Init logging pour tests (idempotent)
pub fn init_test_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init()
        .ok();
}

/// Horloge pilotée par le test
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Tz>>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Tz>) -> Self {
        Self { now: Arc::new(Mutex::new(now)) }
    }

    pub fn set(&self, now: DateTime<Tz>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Tz> {
        *self.now.lock()
    }
}

/// Sleeper qui enregistre les pauses demandées sans attendre
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.lock().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
    }
}

/// Harness complet : un stub par collaborateur + horloge/sleeper manuels
pub struct TestHarness {
    pub clock: ManualClock,
    pub sleeper: RecordingSleeper,
    pub probe: ScriptedProbe,
    pub camera: StubCamera,
    pub classifier: ScriptedClassifier,
    pub notifier: RecordingNotifier,
    pub dataset: MemoryDataset,
}

impl TestHarness {
    /// Crée un harness démarrant à `now`, porte fermée par défaut
    pub fn new(now: DateTime<Tz>) -> Self {
        init_test_logging();
        Self {
            clock: ManualClock::at(now),
            sleeper: RecordingSleeper::new(),
            probe: ScriptedProbe::new(),
            camera: StubCamera::new(),
            classifier: ScriptedClassifier::always(false),
            notifier: RecordingNotifier::new(),
            dataset: MemoryDataset::new(),
        }
    }

    /// Remplace le classifieur (ex: porte ouverte)
    pub fn with_classifier(mut self, classifier: ScriptedClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Assert qu'une notification avec ce titre a été envoyée
    pub fn assert_notified(&self, title: &str) -> anyhow::Result<()> {
        let titles = self.notifier.titles();
        if titles.iter().any(|t| t == title) {
            return Ok(());
        }
        anyhow::bail!("Expected notification '{}' not found, got {:?}", title, titles);
    }

    /// Nombre d'images archivées
    pub fn archived(&self) -> usize {
        self.dataset.entries().len()
    }
}
