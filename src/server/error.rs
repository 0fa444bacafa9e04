//! Error types for the server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::PredictorError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A record in the batch failed validation; nothing was predicted.
    #[error("{message}")]
    Validation {
        message: String,
        record: usize,
        fields: Vec<String>,
    },

    #[error(transparent)]
    Rejected(#[from] JsonRejection),

    #[error("Model not loaded")]
    NotReady,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PredictorError> for ServerError {
    fn from(err: PredictorError) -> Self {
        match err {
            PredictorError::Validation { index, ref source } => ServerError::Validation {
                fields: source.fields(),
                record: index,
                message: err.to_string(),
            },
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ServerError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": true, "message": msg }),
            ),
            ServerError::Validation {
                message,
                record,
                fields,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": true, "message": message, "record": record, "fields": fields }),
            ),
            ServerError::Rejected(rejection) => (
                rejection.status(),
                json!({ "error": true, "message": rejection.body_text() }),
            ),
            ServerError::NotReady => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": true, "message": "Model not loaded" }),
            ),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": true, "message": "An internal error occurred" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
