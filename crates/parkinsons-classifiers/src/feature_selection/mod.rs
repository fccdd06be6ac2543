//! Feature selection utilities.
//!
//! Ranks the feature columns of a training split and keeps the top K, by
//! random forest importance (default), univariate F-test or recursive
//! feature elimination.
pub mod importance;
pub mod univariate_selection;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::SelectionMethod;
use crate::data_handling::Dataset;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedFeature {
    pub name: String,
    /// Column index in the full feature matrix.
    pub index: usize,
    /// Importance or F-score, depending on the method.
    pub score: f64,
}

/// Ordered, top-K selection of feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelection {
    pub method: SelectionMethod,
    pub requested: usize,
    /// Names of every column the selection was computed over.
    pub source_columns: Vec<String>,
    pub features: Vec<SelectedFeature>,
}

impl FeatureSelection {
    pub fn indices(&self) -> Vec<usize> {
        self.features.iter().map(|f| f.index).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Keep only the selected columns of a full-width matrix.
    pub fn apply_matrix(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.source_columns.len() {
            return Err(PipelineError::DataFormat(format!(
                "selection expects {} columns, input has {}",
                self.source_columns.len(),
                x.ncols()
            )));
        }
        Ok(x.select(Axis(1), &self.indices()))
    }

    pub fn apply(&self, dataset: &Dataset) -> Result<Dataset> {
        if dataset.feature_names != self.source_columns {
            return Err(PipelineError::DataFormat(
                "dataset columns differ from the columns used for selection".to_string(),
            ));
        }
        Ok(dataset.select_columns(&self.indices()))
    }
}

/// Select the top `k` columns of a labeled training split. Always returns
/// `min(k, available columns)` features.
pub fn select_features(
    train: &Dataset,
    method: SelectionMethod,
    k: usize,
    n_trees: usize,
    seed: u64,
) -> Result<FeatureSelection> {
    let y = train.labels()?;
    let available = train.n_features();
    if available == 0 {
        return Err(PipelineError::InsufficientData("no feature columns to select from".to_string()));
    }
    let k_eff = k.min(available);

    let ranked = match method {
        SelectionMethod::RandomForestImportance => {
            importance::select_by_importance(&train.x, y, k_eff, n_trees, seed)?
        }
        SelectionMethod::KBest => univariate_selection::SelectKBest::new(k_eff).fit(&train.x, y)?,
        SelectionMethod::Rfe => {
            importance::recursive_feature_elimination(&train.x, y, k_eff, n_trees, seed)?
        }
    };

    let features: Vec<SelectedFeature> = ranked
        .into_iter()
        .map(|(index, score)| SelectedFeature {
            name: train.feature_names[index].clone(),
            index,
            score,
        })
        .collect();

    log::info!(
        "Selected {} of {} features using {:?}: {}",
        features.len(),
        available,
        method,
        features.iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join(", ")
    );

    Ok(FeatureSelection {
        method,
        requested: k,
        source_columns: train.feature_names.clone(),
        features,
    })
}
