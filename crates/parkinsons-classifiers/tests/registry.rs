mod common;

use std::sync::Arc;

use parkinsons_classifiers::error::PipelineError;
use parkinsons_classifiers::pipeline::train_pipeline;
use parkinsons_classifiers::registry::{HealthState, ModelRegistry};

#[test]
fn test_predict_before_training_is_not_trained_error() {
    let registry = ModelRegistry::default();
    let ds = common::synthetic_dataset(10, 61);
    assert!(matches!(registry.predict(&ds), Err(PipelineError::ModelNotTrained)));
    assert!(!registry.is_loaded());
}

#[test]
fn test_train_installs_and_serves_predictions() {
    let registry = ModelRegistry::new(0);
    let ds = common::synthetic_dataset(120, 62);
    let installed = registry.train(&ds, &common::fast_config()).unwrap();
    assert_eq!(installed.version, 1);

    let health = registry.health();
    assert_eq!(health.status, HealthState::Healthy);
    assert!(health.models_loaded && health.scaler_loaded && health.features_loaded);

    let info = registry.info().unwrap();
    assert_eq!(info.version, 1);
    assert_eq!(info.models.len(), 3);
    assert_eq!(info.total_features, 15);
    assert!(info.models.iter().all(|m| m.features_count == 15 && m.test_f1.is_some()));

    let predictions = registry.predict(&ds).unwrap();
    assert_eq!(predictions.names.len(), 120);
}

#[test]
fn test_history_depth_bounds_kept_versions() {
    let ds = common::synthetic_dataset(80, 63);
    let config = common::fast_config();
    let registry = ModelRegistry::new(2);
    for _ in 0..4 {
        let run = train_pipeline(&ds, &config).unwrap();
        registry.install(run.pipeline);
    }
    assert_eq!(registry.current_version(), Some(4));
    let history: Vec<u64> = registry.history().iter().map(|h| h.version).collect();
    assert_eq!(history, vec![2, 3]);

    assert_eq!(registry.rollback().unwrap().version, 3);
    assert_eq!(registry.rollback().unwrap().version, 2);
    assert!(matches!(registry.rollback(), Err(PipelineError::InsufficientData(_))));
    assert_eq!(registry.current_version(), Some(2));
}

#[test]
fn test_zero_history_depth_replaces_without_history() {
    let ds = common::synthetic_dataset(80, 64);
    let registry = ModelRegistry::new(0);
    registry.install(train_pipeline(&ds, &common::fast_config()).unwrap().pipeline);
    registry.install(train_pipeline(&ds, &common::fast_config()).unwrap().pipeline);
    assert!(registry.history().is_empty());
    assert!(registry.rollback().is_err());
}

#[test]
fn test_readers_keep_their_pipeline_across_swaps() {
    let ds = common::synthetic_dataset(80, 65);
    let registry = ModelRegistry::new(1);
    registry.install(train_pipeline(&ds, &common::fast_config()).unwrap().pipeline);

    let held = registry.current().unwrap();
    let before = held.predict(&ds).unwrap();
    registry.install(train_pipeline(&ds, &common::fast_config()).unwrap().pipeline);

    assert!(!Arc::ptr_eq(&held, &registry.current().unwrap()));
    assert_eq!(held.predict(&ds).unwrap(), before);
}

#[test]
fn test_saved_pipeline_loads_into_registry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    let ds = common::synthetic_dataset(80, 66);

    let source = ModelRegistry::new(0);
    source.train(&ds, &common::fast_config()).unwrap();
    source.save_current(&path).unwrap();

    let target = ModelRegistry::new(0);
    target.load(&path).unwrap();
    assert_eq!(target.predict(&ds).unwrap(), source.predict(&ds).unwrap());
}
