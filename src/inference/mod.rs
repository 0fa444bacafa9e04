//! Inference
//!
//! [`Predictor`] bundles a feature schema, the transformer built from it and
//! a fitted model. Construction checks that the three agree; after that a
//! predictor is read-only and safe to share across threads.

mod config;
mod predictor;

pub use config::InferenceConfig;
pub use predictor::Predictor;
