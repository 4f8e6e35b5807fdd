/*!
# Doorwatch DevKit - Stubs et Utilitaires pour tests

Bibliothèque facilitant les tests du service de présence et de l'agent avec:
- Stubs de chaque collaborateur (ping, caméra, classifieur, ntfy, dataset)
- Horloge manuelle et sleeper instantané pour les retries
- Harness regroupant le tout
*/

pub mod stubs;
pub mod test_utils;

pub use stubs::{
    snapshot_of, MemoryDataset, RecordingNotifier, ScriptedClassifier, ScriptedProbe, StaticPresence, StubCamera,
    FAKE_JPEG,
};
pub use test_utils::{local, ManualClock, RecordingSleeper, TestHarness, TEST_TZ};
