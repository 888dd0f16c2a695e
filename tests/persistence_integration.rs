//! Integration tests for the persistence seam

mod common;

use common::builders::reference_document;
use common::mock_helpers::{fast_config, recording_workers};
use hand_reconfig::persistence::{ConfigStore, FileConfigStore, PersistedConfig};
use hand_reconfig::{Controller, ControllerError, DocumentFormat, LifecyclePhase};
use mockall::mock;
use tempfile::TempDir;

mock! {
    Store {}

    impl ConfigStore for Store {
        fn save(&self, config: &PersistedConfig) -> hand_reconfig::Result<()>;
        fn load(&self) -> hand_reconfig::Result<Option<PersistedConfig>>;
    }
}

#[test]
fn test_store_receives_source_and_snapshot() {
    let text = reference_document().to_yaml();
    let expected = text.clone();

    let mut store = MockStore::new();
    store
        .expect_save()
        .withf(move |config| {
            config.source == expected
                && config.format == DocumentFormat::Yaml
                && config.topology.inputs.len() == 1
                && config.topology.outputs.len() == 1
        })
        .times(1)
        .returning(|_| Ok(()));

    let (workers, _log) = recording_workers();
    let mut controller = Controller::new(fast_config(), workers, store);
    assert!(controller.apply(&text, false).unwrap().persisted);
}

#[test]
fn test_failing_store_does_not_block_resume() {
    let mut store = MockStore::new();
    store
        .expect_save()
        .times(1)
        .returning(|_| Err(ControllerError::Persistence("flash worn out".to_string())));

    let (workers, _log) = recording_workers();
    let mut controller = Controller::new(fast_config(), workers, store);
    let report = controller.apply(&reference_document().to_yaml(), true).unwrap();

    assert!(!report.persisted);
    assert!(controller.workers_running());
    assert_eq!(controller.phase(), LifecyclePhase::Running);
}

#[test]
fn test_restore_propagates_load_error() {
    let mut store = MockStore::new();
    store
        .expect_load()
        .times(1)
        .returning(|| Err(ControllerError::Persistence("corrupt".to_string())));

    let (workers, log) = recording_workers();
    let mut controller = Controller::new(fast_config(), workers, store);
    assert!(controller.restore().is_err());
    assert_eq!(log.start_count(), 0);
    assert_eq!(controller.phase(), LifecyclePhase::Uninitialized);
}

#[test]
fn test_file_store_snapshot_is_readable_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("topology.json");

    let (workers, _log) = recording_workers();
    let mut controller = Controller::new(fast_config(), workers, FileConfigStore::new(&path));
    controller.apply(&reference_document().to_yaml(), false).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["format"], "yaml");
    assert_eq!(json["topology"]["outputs"][0]["type"], "DC_motor");
    assert_eq!(json["topology"]["outputs"][0]["name"], "motor1");
    assert_eq!(json["topology"]["inputs"][0]["function"], "linear");
}
