mod common;

use parkinsons_classifiers::data_handling::Dataset;
use parkinsons_classifiers::io::{
    load_pipeline, read_voice_csv, read_voice_csv_from_reader, save_pipeline, write_predictions_csv,
};
use parkinsons_classifiers::pipeline::{analyze, train_pipeline};

// ----------------------------------------------------------------------------
// End to end
// ----------------------------------------------------------------------------

#[test]
fn test_end_to_end_random_forest_cv_accuracy() {
    let ds = common::synthetic_dataset(195, 51);
    let config = common::fast_config();
    assert_eq!(config.n_features, 15);
    assert_eq!(config.cv_folds, 5);

    let run = train_pipeline(&ds, &config).expect("training should succeed");
    let pipeline = &run.pipeline;
    assert_eq!(pipeline.selection.len(), 15);
    assert!(run.failures().is_empty(), "failures: {:?}", run.failures());
    assert_eq!(run.evaluations().len(), 3);

    let forest = pipeline
        .models
        .iter()
        .find(|m| m.name() == "random_forest")
        .expect("random forest should be trained");
    assert!(forest.cv.mean >= 0.85, "random forest CV accuracy {}", forest.cv.mean);
    assert_eq!(forest.cv.scores.len(), 5);

    for result in run.evaluations() {
        assert!((0.0..=1.0).contains(&result.accuracy));
        assert!((0.0..=1.0).contains(&result.f1));
        assert_eq!(result.confusion_matrix.total(), 39);
        assert!(result.roc_auc.is_some());
    }
    assert!(pipeline.best_model().is_some());
}

#[test]
fn test_predicts_file_without_status_column() {
    let ds = common::synthetic_dataset(195, 52);
    let run = train_pipeline(&ds, &common::fast_config()).unwrap();

    let unlabeled = read_voice_csv_from_reader(common::synthetic_csv(12, 99, false).as_bytes()).unwrap();
    assert!(!unlabeled.has_labels());
    let predictions = run.pipeline.predict(&unlabeled).expect("inference without labels");

    assert_eq!(predictions.names, unlabeled.names);
    assert_eq!(predictions.features_used.len(), 15);
    assert_eq!(predictions.models.len(), 3);
    assert!(predictions.failures.is_empty());
    for model in &predictions.models {
        assert_eq!(model.predictions.len(), 12);
        for (&label, &p) in model.predictions.iter().zip(model.probabilities.iter()) {
            assert!((0.0..=1.0).contains(&p));
            assert_eq!(label, usize::from(p >= 0.5));
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predictions.csv");
    write_predictions_csv(&path, &predictions).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    let header = written.lines().next().unwrap();
    assert!(header.starts_with("name,"));
    assert!(header.contains("random_forest_probability"));
    assert_eq!(written.lines().count(), 13);
}

#[test]
fn test_missing_inference_cells_use_training_means() {
    let ds = common::synthetic_dataset(120, 53);
    let run = train_pipeline(&ds, &common::fast_config()).unwrap();

    let mut incomplete = Dataset {
        y: None,
        ..ds.select_rows(&[0, 1, 2])
    };
    incomplete.x[(1, 0)] = f64::NAN;
    let predictions = run.pipeline.predict(&incomplete).unwrap();
    for model in &predictions.models {
        assert!(model.probabilities.iter().all(|p| p.is_finite()));
    }
}

#[test]
fn test_fixed_seed_runs_are_identical() {
    let ds = common::synthetic_dataset(150, 54);
    let a = train_pipeline(&ds, &common::fast_config()).unwrap();
    let b = train_pipeline(&ds, &common::fast_config()).unwrap();
    assert_eq!(a.evaluations(), b.evaluations());
    assert_eq!(
        a.pipeline.predict(&ds).unwrap(),
        b.pipeline.predict(&ds).unwrap()
    );
}

// ----------------------------------------------------------------------------
// Artifacts and reports
// ----------------------------------------------------------------------------

#[test]
fn test_saved_pipeline_reproduces_predictions() {
    let ds = common::synthetic_dataset(150, 55);
    let run = train_pipeline(&ds, &common::fast_config()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    save_pipeline(&run.pipeline, &path).unwrap();

    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["version"], 1);
    assert_eq!(saved["models"].as_array().unwrap().len(), 3);

    let loaded = load_pipeline(&path).unwrap();
    assert_eq!(loaded.feature_names(), run.pipeline.feature_names());
    assert_eq!(loaded.predict(&ds).unwrap(), run.pipeline.predict(&ds).unwrap());
}

#[test]
fn test_report_written_when_output_dir_is_set() {
    let dir = tempfile::tempdir().unwrap();
    let ds = common::synthetic_dataset(120, 56);
    let mut config = common::fast_config();
    config.output_dir = Some(dir.path().to_path_buf());

    let run = train_pipeline(&ds, &config).unwrap();
    let report_dir = run.report_dir.expect("report directory");
    assert!(report_dir.starts_with(dir.path()));
    assert!(report_dir
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with("output_")));

    let html = std::fs::read_to_string(report_dir.join("evaluation_report.html")).unwrap();
    assert!(html.contains("ROC Curves"));
    let metrics = std::fs::read_to_string(report_dir.join("model_metrics.csv")).unwrap();
    assert_eq!(metrics.lines().count(), 4);
}

#[test]
fn test_report_escapes_configuration_text() {
    let dir = tempfile::tempdir().unwrap();
    let ds = common::synthetic_dataset(120, 59);
    let mut config = common::fast_config();
    config.output_dir = Some(dir.path().join("<run&x>"));

    let run = train_pipeline(&ds, &config).unwrap();
    let report_dir = run.report_dir.expect("report directory");
    let html = std::fs::read_to_string(report_dir.join("evaluation_report.html")).unwrap();
    assert!(html.contains("&lt;run&amp;x&gt;"));
    assert!(!html.contains("<run&x>"));
}

#[test]
fn test_analysis_summarises_dataset() {
    let ds = common::synthetic_dataset(195, 57);
    let report = analyze(&ds, &common::fast_config()).unwrap();

    assert_eq!(report.summary.n_rows, 195);
    assert_eq!(report.summary.n_columns, 24);
    assert_eq!(report.summary.missing_values.len(), 22);
    assert_eq!(report.summary.duplicate_rows, 0);
    assert!(report.summary.infinite_values.is_empty());
    assert!(report.summary.negative_values.is_empty());
    assert!(report.error.is_none(), "unexpected error: {:?}", report.error);

    let features = report.features.expect("feature analysis");
    assert_eq!(features.selected_features.len(), 15);
    assert_eq!(features.model_performance.model, "random_forest");

    let json = serde_json::to_value(&report.outliers).unwrap();
    assert!(json["detailed_results"]["iqr"].is_array());
}

#[test]
fn test_analysis_flags_duplicates_and_negative_jitter() {
    let ds = common::synthetic_dataset(60, 58);
    let mut rows: Vec<usize> = (0..60).collect();
    rows.extend([0, 1]);
    let mut noisy = ds.select_rows(&rows);
    let jitter = noisy.column_index("MDVP:Jitter(%)").unwrap();
    noisy.x[(5, jitter)] = -0.002;

    let report = analyze(&noisy, &common::fast_config()).unwrap();
    assert_eq!(report.summary.duplicate_rows, 2);
    assert_eq!(report.summary.negative_values.get("MDVP:Jitter(%)"), Some(&1));
    assert_eq!(report.summary.negative_values.len(), 1);
    assert!(report.summary.infinite_values.is_empty());
}

/// Runs against the UCI recordings when `PARKINSONS_DATA` points at them.
#[test]
fn test_real_dataset_when_available() {
    let Ok(path) = std::env::var("PARKINSONS_DATA") else {
        return;
    };
    let ds = read_voice_csv(&path).unwrap();
    let run = train_pipeline(&ds, &common::fast_config()).unwrap();
    let forest = run
        .pipeline
        .models
        .iter()
        .find(|m| m.name() == "random_forest")
        .unwrap();
    assert!(forest.cv.mean >= 0.85, "random forest CV accuracy {}", forest.cv.mean);
}
