//! Prediction server
//!
//! Exposes the loaded [`Predictor`](crate::inference::Predictor) over HTTP:
//! - `GET /health` - readiness and model details
//! - `POST /predict` - `{"data": [record, ..]}` in, `{"predictions": [..]}` out

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::{PredictRequest, PredictResponse};
pub use state::AppState;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub schema_path: PathBuf,
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            model_path: std::env::var("MODEL_PATH")
                .unwrap_or_else(|_| "models/model.json".to_string())
                .into(),
            schema_path: std::env::var("SCHEMA_PATH")
                .unwrap_or_else(|_| "models/feature_schema.json".to_string())
                .into(),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2 * 1024 * 1024), // 2MB
        }
    }
}

/// Load the artifacts and serve until ctrl+c.
///
/// Artifacts are loaded before the listener binds; a missing or mismatched
/// schema or model aborts startup.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        model_path = %config.model_path.display(),
        schema_path = %config.schema_path.display(),
        "Loading artifacts"
    );

    let state = Arc::new(AppState::new(config.clone()));
    if let Err(e) = state.load_artifacts() {
        error!(error = %e, "Failed to load artifacts, refusing to start");
        return Err(e.into());
    }

    let app = create_router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        address = %addr,
        max_body_size_kb = config.max_body_size / 1024,
        started_at = %start_time.to_rfc3339(),
        "Ames price predictor starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    // Graceful shutdown on ctrl+c
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        if std::env::var("API_PORT").is_err() {
            assert_eq!(config.port, 8000);
        }
        if std::env::var("MAX_BODY_SIZE").is_err() {
            assert_eq!(config.max_body_size, 2 * 1024 * 1024);
        }
    }

    #[tokio::test]
    async fn test_missing_artifacts_abort_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            model_path: dir.path().join("model.json"),
            schema_path: dir.path().join("feature_schema.json"),
            max_body_size: 1024,
        };
        assert!(run_server(config).await.is_err());
    }
}
