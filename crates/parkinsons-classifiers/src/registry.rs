//! Shared, swappable holder of the trained pipeline.
//!
//! Request handlers take a `&ModelRegistry` instead of reaching for global
//! state. Training runs outside the lock; only the pointer swap is done
//! under the write guard, so concurrent readers always see a complete
//! pipeline.
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::data_handling::Dataset;
use crate::error::{PipelineError, Result};
use crate::io::artifact::{load_pipeline, save_pipeline};
use crate::pipeline::{train_pipeline, PredictionSet, TrainedPipeline};

/// A pipeline together with the registry version it was installed as.
#[derive(Debug, Clone)]
pub struct InstalledPipeline {
    pub version: u64,
    pub installed_at: DateTime<Utc>,
    pub pipeline: Arc<TrainedPipeline>,
}

#[derive(Debug, Default)]
struct RegistryState {
    current: Option<InstalledPipeline>,
    /// Previously installed pipelines, most recent last.
    history: VecDeque<InstalledPipeline>,
    next_version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    ModelsNotLoaded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub models_loaded: bool,
    pub scaler_loaded: bool,
    pub features_loaded: bool,
    pub version: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub cv_accuracy: f64,
    pub cv_std: f64,
    pub test_accuracy: Option<f64>,
    pub test_f1: Option<f64>,
    pub features_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryInfo {
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    pub models: Vec<ModelSummary>,
    pub selected_features: Vec<String>,
    pub total_features: usize,
    pub best_model: Option<String>,
    pub history: Vec<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub version: u64,
    pub installed_at: DateTime<Utc>,
    pub trained_at: DateTime<Utc>,
    pub models: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ModelRegistry {
    state: RwLock<RegistryState>,
    history_depth: usize,
}

impl ModelRegistry {
    /// `history_depth` previous pipelines are kept for `rollback`; 0 keeps
    /// none.
    pub fn new(history_depth: usize) -> Self {
        ModelRegistry {
            state: RwLock::new(RegistryState::default()),
            history_depth,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.history_depth)
    }

    pub fn history_depth(&self) -> usize {
        self.history_depth
    }

    pub fn is_loaded(&self) -> bool {
        self.state.read().current.is_some()
    }

    pub fn current(&self) -> Result<Arc<TrainedPipeline>> {
        self.state
            .read()
            .current
            .as_ref()
            .map(|installed| Arc::clone(&installed.pipeline))
            .ok_or(PipelineError::ModelNotTrained)
    }

    pub fn current_version(&self) -> Option<u64> {
        self.state.read().current.as_ref().map(|i| i.version)
    }

    /// Make `pipeline` the current one. The replaced pipeline moves into the
    /// history, which is trimmed to `history_depth`.
    pub fn install(&self, pipeline: TrainedPipeline) -> InstalledPipeline {
        let pipeline = Arc::new(pipeline);
        let mut state = self.state.write();
        state.next_version += 1;
        let installed = InstalledPipeline {
            version: state.next_version,
            installed_at: Utc::now(),
            pipeline,
        };
        if let Some(previous) = state.current.replace(installed.clone()) {
            if self.history_depth > 0 {
                state.history.push_back(previous);
            }
        }
        while state.history.len() > self.history_depth {
            state.history.pop_front();
        }
        log::info!(
            "Installed pipeline version {} ({} prior versions kept)",
            installed.version,
            state.history.len()
        );
        installed
    }

    /// Train a new pipeline and install it. The current pipeline keeps
    /// serving until training has finished.
    pub fn train(&self, dataset: &Dataset, config: &PipelineConfig) -> Result<InstalledPipeline> {
        let run = train_pipeline(dataset, config)?;
        if let Some(dir) = &run.report_dir {
            log::info!("Training report written to {}", dir.display());
        }
        Ok(self.install(run.pipeline))
    }

    pub fn predict(&self, dataset: &Dataset) -> Result<PredictionSet> {
        self.current()?.predict(dataset)
    }

    /// Reinstate the most recent previous pipeline.
    pub fn rollback(&self) -> Result<InstalledPipeline> {
        let mut state = self.state.write();
        let previous = state.history.pop_back().ok_or_else(|| {
            PipelineError::InsufficientData("no previous pipeline to roll back to".to_string())
        })?;
        state.current = Some(previous.clone());
        log::info!("Rolled back to pipeline version {}", previous.version);
        Ok(previous)
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state
            .read()
            .history
            .iter()
            .map(|installed| HistoryEntry {
                version: installed.version,
                installed_at: installed.installed_at,
                trained_at: installed.pipeline.trained_at,
                models: installed.pipeline.model_names(),
            })
            .collect()
    }

    pub fn info(&self) -> Result<RegistryInfo> {
        let state = self.state.read();
        let installed = state.current.as_ref().ok_or(PipelineError::ModelNotTrained)?;
        let pipeline = &installed.pipeline;
        let features_count = pipeline.selection.len();

        let models = pipeline
            .models
            .iter()
            .map(|m| {
                let evaluation = pipeline.evaluations.iter().find(|e| e.model == m.name());
                ModelSummary {
                    name: m.name().to_string(),
                    cv_accuracy: m.cv.mean,
                    cv_std: m.cv.std,
                    test_accuracy: evaluation.map(|e| e.accuracy),
                    test_f1: evaluation.map(|e| e.f1),
                    features_count,
                }
            })
            .collect();

        Ok(RegistryInfo {
            version: installed.version,
            trained_at: pipeline.trained_at,
            models,
            selected_features: pipeline.feature_names(),
            total_features: features_count,
            best_model: pipeline.best_model().map(|e| e.model.clone()),
            history: state.history.iter().map(|i| i.version).collect(),
        })
    }

    pub fn health(&self) -> HealthReport {
        let state = self.state.read();
        let current = state.current.as_ref();
        let models_loaded = current.map_or(false, |i| !i.pipeline.models.is_empty());
        let scaler_loaded = current.is_some();
        let features_loaded = current.map_or(false, |i| !i.pipeline.selection.is_empty());
        let status = if models_loaded && scaler_loaded && features_loaded {
            HealthState::Healthy
        } else {
            HealthState::ModelsNotLoaded
        };
        HealthReport {
            status,
            models_loaded,
            scaler_loaded,
            features_loaded,
            version: current.map(|i| i.version),
            timestamp: Utc::now(),
        }
    }

    pub fn save_current<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_pipeline(&*self.current()?, path)
    }

    /// Load a saved pipeline and install it.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<InstalledPipeline> {
        let pipeline = load_pipeline(path)?;
        Ok(self.install(pipeline))
    }
}
