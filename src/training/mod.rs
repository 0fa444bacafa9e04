//! Model training
//!
//! Loads a labelled CSV, engineers the feature matrix with the same
//! transformer used at serving time, ranks candidate models by k-fold RMSE
//! and writes the winner as a model artifact next to its feature schema.

mod config;
mod engine;
pub mod cross_validation;

pub use config::{default_candidates, ModelSpec, TrainingConfig};
pub use cross_validation::{cross_validate, train_test_split, CVResults, CVSplit, KFold};
pub use engine::{select_best, CandidateScore, Dataset, TrainEngine, TrainOutcome, TrainingReport};
