//! Error types for the price predictor

use thiserror::Error;

use crate::features::RecordError;

/// Result type alias for predictor operations
pub type Result<T> = std::result::Result<T, PredictorError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum PredictorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data error: {0}")]
    Data(String),

    /// Schema and model disagree, or the schema itself is unusable.
    #[error("Schema contract violation: {0}")]
    Schema(String),

    #[error("Record {index}: {source}")]
    Validation {
        index: usize,
        #[source]
        source: RecordError,
    },

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    Computation(String),
}

impl From<polars::error::PolarsError> for PredictorError {
    fn from(err: polars::error::PolarsError) -> Self {
        PredictorError::Data(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PredictorError {
    fn from(err: ndarray::ShapeError) -> Self {
        PredictorError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PredictorError::Data("bad column".to_string());
        assert_eq!(err.to_string(), "Data error: bad column");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PredictorError = io_err.into();
        assert!(matches!(err, PredictorError::Io(_)));
    }

    #[test]
    fn test_validation_display_names_record() {
        let err = PredictorError::Validation {
            index: 3,
            source: RecordError::Missing(vec!["Yr Sold".to_string()]),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Record 3:"));
        assert!(msg.contains("Yr Sold"));
    }
}
