//! Reading voice-measurement CSVs, writing predictions, and persisting
//! trained pipelines.
pub mod artifact;
pub mod voice_csv;

pub use artifact::{load_pipeline, save_pipeline, PipelineArtifact};
pub use voice_csv::{read_voice_csv, read_voice_csv_from_reader, write_predictions_csv};
