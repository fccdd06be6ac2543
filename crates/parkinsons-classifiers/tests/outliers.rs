mod common;

use ndarray::Array2;
use parkinsons_classifiers::config::{OutlierConfig, OutlierMethod};
use parkinsons_classifiers::data_handling::Dataset;
use parkinsons_classifiers::error::PipelineError;
use parkinsons_classifiers::outliers::{
    apply_iqr, detect_and_report_outliers, detect_outliers_isolation_forest, detect_outliers_zscore,
    remove_outliers,
};

#[test]
fn test_iqr_count_grows_as_multiplier_shrinks() {
    let ds = common::synthetic_dataset(195, 11);
    for column in ["MDVP:Fo(Hz)", "NHR", "PPE", "spread1"] {
        let mut previous = 0;
        for multiplier in [1.5, 1.0, 0.75, 0.5, 0.25] {
            let count = apply_iqr(&ds, column, multiplier).unwrap().outlier_count;
            assert!(
                count >= previous,
                "{}: {} outliers at m={} but {} at a larger multiplier",
                column,
                count,
                multiplier,
                previous
            );
            previous = count;
        }
    }
}

#[test]
fn test_zero_variance_column_has_no_zscore_outliers() {
    let x = Array2::from_shape_fn((30, 2), |(r, c)| if c == 0 { 4.2 } else { r as f64 });
    let ds = Dataset::new(
        (0..30).map(|i| format!("r{}", i)).collect(),
        vec!["flat".to_string(), "ramp".to_string()],
        x,
        None,
    )
    .unwrap();
    let flat = detect_outliers_zscore(&ds, "flat", 3.0).unwrap();
    assert_eq!(flat.outlier_count, 0);
    assert!(flat.outlier_indices.is_empty());
}

#[test]
fn test_report_covers_every_feature_for_each_method() {
    let ds = common::synthetic_dataset(195, 12);
    let report = detect_and_report_outliers(&ds, &OutlierConfig::default()).unwrap();

    assert_eq!(report.n_rows, 195);
    assert_eq!(report.methods, vec![OutlierMethod::Iqr, OutlierMethod::Zscore]);
    for method in [OutlierMethod::Iqr, OutlierMethod::Zscore] {
        let columns = &report.detailed_results[&method];
        assert_eq!(columns.len(), 22);
        let total: usize = columns.iter().map(|c| c.outlier_count).sum();
        assert_eq!(report.summary[&method].total_outliers, total);
    }
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("domain experts")));

    // detection never touches the input
    assert_eq!(ds, common::synthetic_dataset(195, 12));
}

#[test]
fn test_remove_outliers_drops_flagged_rows_only() {
    let ds = common::synthetic_dataset(195, 13);
    let report = detect_and_report_outliers(&ds, &OutlierConfig::default()).unwrap();

    let columns = vec!["PPE".to_string()];
    let flagged = report.flagged_rows(OutlierMethod::Iqr, Some(&columns)).unwrap();
    let cleaned = remove_outliers(&ds, &report, OutlierMethod::Iqr, Some(&columns)).unwrap();
    assert_eq!(cleaned.n_rows(), ds.n_rows() - flagged.len());
    for name in &cleaned.names {
        let original_row = ds.names.iter().position(|n| n == name).unwrap();
        assert!(!flagged.contains(&original_row));
    }
}

#[test]
fn test_remove_outliers_rejects_method_missing_from_report() {
    let ds = common::synthetic_dataset(40, 14);
    let config = OutlierConfig {
        methods: vec![OutlierMethod::Iqr],
        ..OutlierConfig::default()
    };
    let report = detect_and_report_outliers(&ds, &config).unwrap();
    assert!(matches!(
        remove_outliers(&ds, &report, OutlierMethod::Zscore, None),
        Err(PipelineError::InvalidConfig(_))
    ));
}

#[test]
fn test_isolation_forest_flags_planted_value() {
    let mut ds = common::synthetic_dataset(195, 15);
    let ppe = ds.column_index("PPE").unwrap();
    ds.x[(17, ppe)] = 25.0;

    let result = detect_outliers_isolation_forest(&ds, "PPE", 0.1, 100, 42).unwrap();
    assert!(result.outlier_indices.contains(&17));
    // about a tenth of the rows, never more
    assert!(result.outlier_count >= 1 && result.outlier_count <= 20, "{}", result.outlier_count);

    let again = detect_outliers_isolation_forest(&ds, "PPE", 0.1, 100, 42).unwrap();
    assert_eq!(again, result);
}

#[test]
fn test_isolation_forest_in_report_and_removal() {
    let ds = common::synthetic_dataset(120, 16);
    let config = OutlierConfig {
        methods: vec![OutlierMethod::IsolationForest],
        ..OutlierConfig::default()
    };
    let report = detect_and_report_outliers(&ds, &config).unwrap();
    assert_eq!(report.detailed_results[&OutlierMethod::IsolationForest].len(), 22);

    let flagged = report.flagged_rows(OutlierMethod::IsolationForest, None).unwrap();
    assert!(!flagged.is_empty());
    let cleaned = remove_outliers(&ds, &report, OutlierMethod::IsolationForest, None).unwrap();
    assert_eq!(cleaned.n_rows(), ds.n_rows() - flagged.len());

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["detailed_results"]["isolation_forest"].is_array());
}

#[test]
fn test_isolation_forest_rejects_bad_contamination() {
    let ds = common::synthetic_dataset(20, 17);
    assert!(matches!(
        detect_outliers_isolation_forest(&ds, "PPE", 0.0, 10, 1),
        Err(PipelineError::InvalidConfig(_))
    ));
}
