//! Error taxonomy shared by every stage of the pipeline.
use thiserror::Error;

/// Failures surfaced by loading, preprocessing, training and inference.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed input: missing columns, non-numeric values, bad labels.
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// Not enough rows or classes left to do the requested work.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("No trained model is available. Train the pipeline first.")]
    ModelNotTrained,

    #[error("Failed to fit {model}: {reason}")]
    Fit { model: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn fit(model: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Fit {
            model: model.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
