//! Ames Housing Price Predictor
//!
//! Tabular regression for the Ames housing dataset, from CSV to a REST
//! endpoint:
//! - Feature engineering with a persisted schema and scaler
//! - Linear, random forest and gradient boosted tree regressors
//! - K-fold model selection and artifact writing
//! - A prediction service and CLI sharing one inference path
//!
//! # Modules
//!
//! - [`features`] - Raw records, feature schema, scaler, transformer
//! - [`model`] - Regressors and the persisted model artifact
//! - [`inference`] - Schema-checked prediction over raw records
//! - [`training`] - Dataset preparation, cross-validation, model selection
//! - [`server`] - HTTP service (`/health`, `/predict`)
//! - [`cli`] - Command-line interface
//! - [`utils`] - CSV loading and saving

pub mod cli;
pub mod error;
pub mod features;
pub mod inference;
pub mod model;
pub mod server;
pub mod training;
pub mod utils;

pub use error::{PredictorError, Result};

/// Prelude for convenient imports
pub mod prelude {
    // Error handling
    pub use crate::error::{PredictorError, Result};

    // Features
    pub use crate::features::{FeatureSchema, FeatureTransformer, RawRecord, RecordError, Scaler, ScalerType};

    // Models
    pub use crate::model::{FittedModel, ModelArtifact, RegressionMetrics, Regressor};

    // Inference
    pub use crate::inference::{InferenceConfig, Predictor};

    // Training
    pub use crate::training::{TrainEngine, TrainingConfig, TrainingReport};
}
