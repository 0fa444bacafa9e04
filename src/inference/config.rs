//! Inference configuration

use serde::{Deserialize, Serialize};

/// Configuration for batch prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Batches with more records than this are predicted on the rayon pool
    pub parallel_threshold: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 256,
        }
    }
}

impl InferenceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }
}
