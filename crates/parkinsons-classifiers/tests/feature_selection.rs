mod common;

use std::collections::BTreeSet;

use parkinsons_classifiers::config::{PipelineConfig, SelectionMethod};
use parkinsons_classifiers::feature_selection::select_features;
use parkinsons_classifiers::preprocessing::Preprocessor;

fn training_split() -> parkinsons_classifiers::data_handling::Dataset {
    let ds = common::synthetic_dataset(195, 31);
    Preprocessor::new(&PipelineConfig::default())
        .prepare(&ds)
        .expect("preparation should succeed")
        .train
}

// ----------------------------------------------------------------------------
// Count
// ----------------------------------------------------------------------------

#[test]
fn test_returns_min_of_k_and_available_features() {
    let train = training_split();
    let cases = [
        (SelectionMethod::RandomForestImportance, vec![1, 5, 15, 22, 30]),
        (SelectionMethod::KBest, vec![1, 5, 15, 22, 30]),
        (SelectionMethod::Rfe, vec![15, 30]),
    ];
    for (method, ks) in cases {
        for k in ks {
            let selection = select_features(&train, method, k, 20, 42).unwrap();
            assert_eq!(
                selection.len(),
                k.min(22),
                "{:?} with k={} returned {} features",
                method,
                k,
                selection.len()
            );
            assert_eq!(selection.requested, k);

            let unique: BTreeSet<usize> = selection.indices().into_iter().collect();
            assert_eq!(unique.len(), selection.len(), "duplicate columns selected");
        }
    }
}

// ----------------------------------------------------------------------------
// Ordering and determinism
// ----------------------------------------------------------------------------

#[test]
fn test_scores_are_descending_and_names_match_columns() {
    let train = training_split();
    for method in [SelectionMethod::RandomForestImportance, SelectionMethod::KBest] {
        let selection = select_features(&train, method, 15, 30, 42).unwrap();
        for pair in selection.features.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for feature in &selection.features {
            assert_eq!(train.feature_names[feature.index], feature.name);
        }
    }
}

#[test]
fn test_same_seed_selects_same_features() {
    let train = training_split();
    let a = select_features(&train, SelectionMethod::RandomForestImportance, 10, 30, 9).unwrap();
    let b = select_features(&train, SelectionMethod::RandomForestImportance, 10, 30, 9).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_apply_keeps_selected_columns_in_order() {
    let train = training_split();
    let selection = select_features(&train, SelectionMethod::KBest, 4, 10, 42).unwrap();
    let reduced = selection.apply(&train).unwrap();
    assert_eq!(reduced.feature_names, selection.names());
    for (j, &c) in selection.indices().iter().enumerate() {
        assert_eq!(reduced.x.column(j), train.x.column(c));
    }
}
