//! Application state management

use std::sync::{Arc, OnceLock};

use crate::error::Result;
use crate::inference::Predictor;

use super::ServerConfig;

/// Application state shared across handlers.
///
/// The predictor is set at most once; handlers read it without locking.
pub struct AppState {
    pub config: ServerConfig,
    predictor: OnceLock<Arc<Predictor>>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// State with no model loaded; `/health` reports not ready.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            predictor: OnceLock::new(),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn with_predictor(config: ServerConfig, predictor: Predictor) -> Self {
        let state = Self::new(config);
        // Fresh lock, cannot already be set
        let _ = state.predictor.set(Arc::new(predictor));
        state
    }

    /// Load the schema and model named in the config. Returns `false` if a
    /// predictor was already installed.
    pub fn load_artifacts(&self) -> Result<bool> {
        if self.predictor.get().is_some() {
            return Ok(false);
        }
        let predictor = Predictor::load(&self.config.schema_path, &self.config.model_path)?;
        Ok(self.predictor.set(Arc::new(predictor)).is_ok())
    }

    pub fn predictor(&self) -> Option<Arc<Predictor>> {
        self.predictor.get().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.predictor.get().is_some()
    }
}
