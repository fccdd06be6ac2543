pub mod cross_validation;
pub mod grid_search;
pub mod trainer;

pub use cross_validation::{cross_validate, CVSplit, CvScores, StratifiedKFold};
pub use trainer::{train_model, train_models, TrainedModel, TrainingOptions};
