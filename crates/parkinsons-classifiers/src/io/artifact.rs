//! JSON persistence for trained pipelines.
//!
//! The artifact stores the recipe rather than fitted parameters: the
//! configuration, the fitted scaler and feature selection, each model's
//! chosen configuration and the scaled training matrix. Every model is
//! seeded, so refitting on load reproduces the saved predictions exactly.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::evaluation::EvaluationResult;
use crate::feature_selection::FeatureSelection;
use crate::models::build_model;
use crate::pipeline::{ModelFailure, TrainedPipeline};
use crate::preprocessing::Scaler;
use crate::training::{CvScores, TrainedModel};

pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub config: ModelConfig,
    pub cv: CvScores,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub version: u32,
    pub config: PipelineConfig,
    pub scaler: Scaler,
    pub fill_values: Vec<f64>,
    pub selection: FeatureSelection,
    pub models: Vec<ModelArtifact>,
    pub evaluations: Vec<EvaluationResult>,
    pub failures: Vec<ModelFailure>,
    pub x_train: Array2<f64>,
    pub y_train: Array1<usize>,
    pub trained_at: DateTime<Utc>,
}

impl PipelineArtifact {
    pub fn from_pipeline(pipeline: &TrainedPipeline) -> Self {
        PipelineArtifact {
            version: ARTIFACT_VERSION,
            config: pipeline.config.clone(),
            scaler: pipeline.scaler.clone(),
            fill_values: pipeline.fill_values.clone(),
            selection: pipeline.selection.clone(),
            models: pipeline
                .models
                .iter()
                .map(|m| ModelArtifact {
                    config: m.config.clone(),
                    cv: m.cv.clone(),
                })
                .collect(),
            evaluations: pipeline.evaluations.clone(),
            failures: pipeline.failures.clone(),
            x_train: pipeline.x_train.clone(),
            y_train: pipeline.y_train.clone(),
            trained_at: pipeline.trained_at,
        }
    }

    /// Refit every model from its stored configuration.
    pub fn into_pipeline(self) -> Result<TrainedPipeline> {
        if self.version != ARTIFACT_VERSION {
            return Err(PipelineError::InvalidConfig(format!(
                "unsupported artifact version {} (expected {})",
                self.version, ARTIFACT_VERSION
            )));
        }
        if self.x_train.ncols() != self.selection.len() {
            return Err(PipelineError::DataFormat(format!(
                "artifact training matrix has {} columns but {} selected features",
                self.x_train.ncols(),
                self.selection.len()
            )));
        }

        let mut models = Vec::with_capacity(self.models.len());
        for saved in self.models {
            let mut model = build_model(&saved.config);
            model.fit(&self.x_train, &self.y_train)?;
            log::debug!("Refit {} from artifact", saved.config.name());
            models.push(TrainedModel {
                config: saved.config,
                model,
                cv: saved.cv,
                grid: None,
            });
        }

        Ok(TrainedPipeline {
            config: self.config,
            scaler: self.scaler,
            fill_values: self.fill_values,
            selection: self.selection,
            models,
            evaluations: self.evaluations,
            failures: self.failures,
            x_train: self.x_train,
            y_train: self.y_train,
            trained_at: self.trained_at,
        })
    }
}

pub fn save_pipeline<P: AsRef<Path>>(pipeline: &TrainedPipeline, path: P) -> Result<()> {
    let writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(writer, &PipelineArtifact::from_pipeline(pipeline))?;
    log::info!("Saved pipeline to {}", path.as_ref().display());
    Ok(())
}

pub fn load_pipeline<P: AsRef<Path>>(path: P) -> Result<TrainedPipeline> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let artifact: PipelineArtifact = serde_json::from_reader(reader)?;
    let pipeline = artifact.into_pipeline()?;
    log::info!(
        "Loaded pipeline trained at {} with models: {}",
        pipeline.trained_at,
        pipeline.model_names().join(", ")
    );
    Ok(pipeline)
}
