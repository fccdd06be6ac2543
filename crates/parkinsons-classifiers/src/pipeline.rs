//! End-to-end orchestration: preprocess, select features, train, evaluate,
//! and apply the fitted pipeline to new recordings.
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelType, PipelineConfig};
use crate::data_handling::{Dataset, DatasetSummary};
use crate::error::{PipelineError, Result};
use crate::evaluation::{best_model_by_f1, evaluate_model, evaluate_models, EvaluationResult};
use crate::feature_selection::{select_features, FeatureSelection, SelectedFeature};
use crate::outliers::{detect_and_report_outliers, OutlierReport};
use crate::preprocessing::{transform_all, PreparedData, Preprocessor, Scaler};
use crate::report;
use crate::training::{train_model, train_models, StratifiedKFold, TrainedModel, TrainingOptions};

/// A model that could not be trained or could not predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFailure {
    pub model: String,
    pub error: String,
}

/// Everything needed to turn raw recordings into predictions. Immutable
/// once built; share it behind an `Arc`.
#[derive(Debug)]
pub struct TrainedPipeline {
    pub config: PipelineConfig,
    pub scaler: Scaler,
    /// Raw training means, used for missing cells at inference.
    pub fill_values: Vec<f64>,
    pub selection: FeatureSelection,
    pub models: Vec<TrainedModel>,
    pub evaluations: Vec<EvaluationResult>,
    pub failures: Vec<ModelFailure>,
    /// Scaled, feature-selected training matrix the models were fit on.
    pub x_train: Array2<f64>,
    pub y_train: Array1<usize>,
    pub trained_at: DateTime<Utc>,
}

/// Per-model output for one prediction request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelPredictions {
    pub model: String,
    pub predictions: Vec<usize>,
    /// Probability of Parkinson's (class 1) per row.
    pub probabilities: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSet {
    pub names: Vec<String>,
    pub features_used: Vec<String>,
    pub models: Vec<ModelPredictions>,
    pub failures: Vec<ModelFailure>,
}

impl PredictionSet {
    pub fn for_model(&self, model: &str) -> Option<&ModelPredictions> {
        self.models.iter().find(|m| m.model == model)
    }
}

impl TrainedPipeline {
    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.selection.names()
    }

    pub fn best_model(&self) -> Option<&EvaluationResult> {
        best_model_by_f1(&self.evaluations)
    }

    /// Scale and select the columns of an unlabeled (or labeled) dataset the
    /// same way the training split was.
    pub fn transform(&self, dataset: &Dataset) -> Result<Array2<f64>> {
        if dataset.feature_names != self.selection.source_columns {
            return Err(PipelineError::DataFormat(format!(
                "expected feature columns {:?}, got {:?}",
                self.selection.source_columns, dataset.feature_names
            )));
        }
        let missing = dataset.total_missing();
        let filled = if missing > 0 {
            log::warn!(
                "{} missing values in prediction input, filling with training means",
                missing
            );
            dataset.fill_missing(&self.fill_values)
        } else {
            dataset.clone()
        };
        let scaled = transform_all(&filled.x, &self.scaler)?;
        self.selection.apply_matrix(&scaled)
    }

    /// Predict every row with every model. A model that fails is listed in
    /// `failures` and does not hide the others' output.
    pub fn predict(&self, dataset: &Dataset) -> Result<PredictionSet> {
        if dataset.n_rows() == 0 {
            return Err(PipelineError::InsufficientData("no rows to predict".to_string()));
        }
        let x = self.transform(dataset)?;

        let mut models = Vec::with_capacity(self.models.len());
        let mut failures = Vec::new();
        for trained in &self.models {
            match trained.model.predict_proba(&x) {
                Ok(proba) => models.push(ModelPredictions {
                    model: trained.name().to_string(),
                    predictions: proba.iter().map(|&p| usize::from(p >= 0.5)).collect(),
                    probabilities: proba.to_vec(),
                }),
                Err(e) => {
                    log::error!("{} failed to predict: {}", trained.name(), e);
                    failures.push(ModelFailure {
                        model: trained.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        log::info!("Predicted {} rows with {} models", dataset.n_rows(), models.len());

        Ok(PredictionSet {
            names: dataset.names.clone(),
            features_used: self.selection.names(),
            models,
            failures,
        })
    }
}

/// Outcome of `train_pipeline`.
#[derive(Debug)]
pub struct TrainingRun {
    pub pipeline: TrainedPipeline,
    /// Directory of the written report, when `output_dir` was configured
    /// and writing succeeded.
    pub report_dir: Option<PathBuf>,
}

impl TrainingRun {
    pub fn evaluations(&self) -> &[EvaluationResult] {
        &self.pipeline.evaluations
    }

    pub fn failures(&self) -> &[ModelFailure] {
        &self.pipeline.failures
    }
}

fn training_options(config: &PipelineConfig) -> TrainingOptions {
    TrainingOptions {
        cv_folds: config.cv_folds,
        seed: config.seed,
        grid_search: config.grid_search,
    }
}

/// Prepared data restricted to the selected feature columns.
struct SelectedData {
    prepared: PreparedData,
    selection: FeatureSelection,
    train: Dataset,
    test: Dataset,
}

fn prepare_and_select(dataset: &Dataset, config: &PipelineConfig) -> Result<SelectedData> {
    let prepared = Preprocessor::new(config).prepare(dataset)?;
    let selection = select_features(
        &prepared.train,
        config.feature_selection,
        config.n_features,
        config.selection_trees,
        config.seed,
    )?;
    let train = selection.apply(&prepared.train)?;
    let test = selection.apply(&prepared.test)?;
    Ok(SelectedData {
        prepared,
        selection,
        train,
        test,
    })
}

/// Clean, split, select, train every configured model and evaluate it on
/// the held-out split.
pub fn train_pipeline(dataset: &Dataset, config: &PipelineConfig) -> Result<TrainingRun> {
    config.validate()?;
    dataset.log_input_data_summary();

    let SelectedData {
        prepared,
        selection,
        train,
        test,
    } = prepare_and_select(dataset, config)?;
    let y_train = train.labels()?.clone();
    let y_test = test.labels()?.clone();

    let outcomes = train_models(&config.models, &train.x, &y_train, &training_options(config))?;

    let mut trained = Vec::new();
    let mut failures = Vec::new();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(model) => trained.push(model),
            Err(e) => failures.push(ModelFailure {
                model: name,
                error: e.to_string(),
            }),
        }
    }

    let results = evaluate_models(&trained, &test.x, &y_test);
    let mut models = Vec::with_capacity(trained.len());
    let mut evaluations = Vec::with_capacity(trained.len());
    for ((name, result), model) in results.into_iter().zip(trained) {
        match result {
            Ok(evaluation) => {
                models.push(model);
                evaluations.push(evaluation);
            }
            Err(e) => failures.push(ModelFailure {
                model: name,
                error: e.to_string(),
            }),
        }
    }

    if models.is_empty() {
        let reasons: Vec<String> = failures
            .iter()
            .map(|f| format!("{}: {}", f.model, f.error))
            .collect();
        return Err(PipelineError::fit("pipeline", reasons.join("; ")));
    }

    if let Some(best) = best_model_by_f1(&evaluations) {
        log::info!("Best model by F1: {} ({:.4})", best.model, best.f1);
    }

    let report_dir = match &config.output_dir {
        Some(dir) => {
            match report::write_evaluation_report(dir, &evaluations, &y_test, &selection, &failures, config) {
                Ok(path) => Some(path),
                Err(e) => {
                    log::error!("Failed to write evaluation report: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    Ok(TrainingRun {
        pipeline: TrainedPipeline {
            config: config.clone(),
            scaler: prepared.scaler,
            fill_values: prepared.fill_values,
            selection,
            models,
            evaluations,
            failures,
            x_train: train.x,
            y_train,
            trained_at: Utc::now(),
        },
        report_dir,
    })
}

/// Selected features and the random forest's held-out performance on them.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureAnalysis {
    pub selected_features: Vec<SelectedFeature>,
    pub model_performance: EvaluationResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub summary: DatasetSummary,
    pub outliers: OutlierReport,
    /// Present when preprocessing and training succeeded.
    pub features: Option<FeatureAnalysis>,
    /// Why `features` is missing.
    pub error: Option<String>,
    pub report_dir: Option<PathBuf>,
}

fn forest_config(config: &PipelineConfig) -> ModelConfig {
    config
        .models
        .iter()
        .find(|m| matches!(m.model_type, ModelType::RandomForest { .. }))
        .cloned()
        .unwrap_or_else(|| ModelConfig::new(config.seed, ModelType::default_random_forest()))
}

fn analyze_features(dataset: &Dataset, config: &PipelineConfig) -> Result<FeatureAnalysis> {
    let selected = prepare_and_select(dataset, config)?;
    let y_train = selected.train.labels()?;
    let y_test = selected.test.labels()?;

    let forest = forest_config(config);
    let folds = StratifiedKFold::new(config.cv_folds, config.seed).split(y_train)?;
    let options = TrainingOptions {
        grid_search: false,
        ..training_options(config)
    };
    let trained = train_model(&forest, &selected.train.x, y_train, &folds, &options)?;
    let performance = evaluate_model(
        trained.name(),
        trained.model.as_ref(),
        &selected.test.x,
        y_test,
        &trained.cv,
    )?;
    Ok(FeatureAnalysis {
        selected_features: selected.selection.features,
        model_performance: performance,
    })
}

/// Describe a dataset: shape, missing values, class balance and outliers,
/// plus selected features and forest performance when the data allows
/// training. A training failure is reported in `error`, not returned.
pub fn analyze(dataset: &Dataset, config: &PipelineConfig) -> Result<AnalysisReport> {
    let summary = dataset.summary();
    if summary.duplicate_rows > 0 {
        log::warn!("{} duplicate rows", summary.duplicate_rows);
    }
    for (column, count) in &summary.infinite_values {
        log::warn!("{} infinite values in {}", count, column);
    }
    for (column, count) in &summary.negative_values {
        log::warn!("{} negative values in {}", count, column);
    }
    let outliers = detect_and_report_outliers(dataset, &config.outliers)?;

    let (features, error) = match analyze_features(dataset, config) {
        Ok(features) => (Some(features), None),
        Err(e) => {
            log::warn!("Feature analysis skipped: {}", e);
            (None, Some(e.to_string()))
        }
    };

    let report_dir = match &config.output_dir {
        Some(dir) => match report::write_outlier_report(dir, dataset, &outliers) {
            Ok(path) => Some(path),
            Err(e) => {
                log::error!("Failed to write outlier report: {}", e);
                None
            }
        },
        None => None,
    };

    Ok(AnalysisReport {
        summary,
        outliers,
        features,
        error,
        report_dir,
    })
}
