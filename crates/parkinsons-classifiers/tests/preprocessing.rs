mod common;

use std::collections::BTreeSet;

use ndarray::Axis;
use parkinsons_classifiers::config::{MissingValueStrategy, PipelineConfig, ScalingMethod};
use parkinsons_classifiers::error::PipelineError;
use parkinsons_classifiers::preprocessing::{
    fit_transform, stratified_train_test_split, transform_all, Preprocessor,
};

#[test]
fn test_standardized_training_columns_have_zero_mean_unit_std() {
    let ds = common::synthetic_dataset(195, 21);
    let prepared = Preprocessor::new(&PipelineConfig::default()).prepare(&ds).unwrap();

    for col in prepared.train.x.axis_iter(Axis(1)) {
        let mean = col.mean().unwrap();
        let std = col.std(0.0);
        assert!(mean.abs() < 1e-9, "column mean {} should be ~0", mean);
        assert!((std - 1.0).abs() < 1e-9, "column std {} should be ~1", std);
    }
}

#[test]
fn test_split_sizes_sum_to_n_and_are_disjoint() {
    let labels: Vec<usize> = (0..195).map(common::status_of).collect();
    for test_size in [0.1, 0.2, 0.33, 0.5] {
        let (train, test) = stratified_train_test_split(&labels, test_size, 42).unwrap();
        assert_eq!(train.len() + test.len(), labels.len());
        assert_eq!(test.len(), (test_size * 195.0_f64).ceil() as usize);

        let train_set: BTreeSet<usize> = train.iter().copied().collect();
        assert!(test.iter().all(|i| !train_set.contains(i)), "row in both splits");
    }
}

#[test]
fn test_split_keeps_class_ratio_and_is_deterministic() {
    let labels: Vec<usize> = (0..195).map(common::status_of).collect();
    let (train_a, test_a) = stratified_train_test_split(&labels, 0.2, 7).unwrap();
    let (train_b, test_b) = stratified_train_test_split(&labels, 0.2, 7).unwrap();
    assert_eq!(train_a, train_b);
    assert_eq!(test_a, test_b);

    let healthy_in_test = test_a.iter().filter(|&&i| labels[i] == 0).count();
    assert_eq!(test_a.len(), 39);
    assert_eq!(healthy_in_test, 10);

    let (_, test_c) = stratified_train_test_split(&labels, 0.2, 8).unwrap();
    assert_ne!(test_a, test_c, "different seeds should shuffle differently");
}

#[test]
fn test_scaler_fit_on_train_is_applied_unchanged() {
    let ds = common::synthetic_dataset(100, 22);
    let config = PipelineConfig {
        scaling: ScalingMethod::MinMax,
        ..PipelineConfig::default()
    };
    let prepared = Preprocessor::new(&config).prepare(&ds).unwrap();

    let raw_test = ds.select_rows(&prepared.test_indices);
    let expected = transform_all(&raw_test.x, &prepared.scaler).unwrap();
    assert_eq!(prepared.test.x, expected);

    let (_, refit) = fit_transform(&ds.select_rows(&prepared.train_indices).x, ScalingMethod::MinMax).unwrap();
    assert_eq!(prepared.train.x, refit);
    assert!(prepared.train.x.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn test_missing_values_dropped_or_filled() {
    let mut ds = common::synthetic_dataset(60, 23);
    ds.x[(3, 0)] = f64::NAN;
    ds.x[(10, 5)] = f64::NAN;

    let dropped = Preprocessor::new(&PipelineConfig::default()).prepare(&ds).unwrap();
    assert_eq!(dropped.train_indices.len() + dropped.test_indices.len(), 58);

    let config = PipelineConfig {
        missing_values: MissingValueStrategy::FillMedian,
        ..PipelineConfig::default()
    };
    let filled = Preprocessor::new(&config).prepare(&ds).unwrap();
    assert_eq!(filled.train_indices.len() + filled.test_indices.len(), 60);
    assert!(filled.train.x.iter().all(|v| v.is_finite()));
}

#[test]
fn test_single_class_and_unlabeled_data_are_rejected() {
    let ds = common::synthetic_dataset(40, 24);
    let healthy: Vec<usize> = (0..40).filter(|&i| common::status_of(i) == 0).collect();
    let one_class = ds.select_rows(&healthy);
    assert!(matches!(
        Preprocessor::new(&PipelineConfig::default()).prepare(&one_class),
        Err(PipelineError::InsufficientData(_))
    ));

    let unlabeled = parkinsons_classifiers::data_handling::Dataset { y: None, ..ds };
    assert!(matches!(
        Preprocessor::new(&PipelineConfig::default()).prepare(&unlabeled),
        Err(PipelineError::DataFormat(_))
    ));
}
