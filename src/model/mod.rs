//! Regression models and the persisted model artifact
//!
//! Every model implements [`Regressor`]. Serving only ever sees a
//! `dyn Regressor`; the concrete kind matters only when an artifact is
//! written or read, which goes through the tagged [`FittedModel`] enum.

pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear;
pub mod metrics;
pub mod random_forest;

use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PredictorError, Result};
use crate::features::FeatureSchema;

pub use decision_tree::DecisionTree;
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use linear::LinearRegression;
pub use metrics::RegressionMetrics;
pub use random_forest::{MaxFeatures, RandomForest};

/// Fail with a shape error unless `actual == expected`.
pub fn check_width(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(PredictorError::Shape {
            expected: format!("{} features", expected),
            actual: format!("{} features", actual),
        });
    }
    Ok(())
}

/// A model mapping a feature vector to a sale price.
pub trait Regressor: Send + Sync {
    /// Short identifier reported by `/health` and the training report
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict a single feature vector.
    fn predict_row(&self, row: &[f64]) -> Result<f64>;

    /// Predict every row of `x`.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mut out = Vec::with_capacity(x.nrows());
        for row in x.outer_iter() {
            let value = match row.as_slice() {
                Some(slice) => self.predict_row(slice)?,
                None => self.predict_row(&row.to_vec())?,
            };
            out.push(value);
        }
        Ok(Array1::from_vec(out))
    }

    /// Input width, or `None` before fitting
    fn n_features(&self) -> Option<usize>;

    /// Structural checks for a model read from disk. A model that passes
    /// never indexes outside a row of width `n_features`.
    fn validate(&self) -> Result<()>;
}

/// Any model this crate can persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedModel {
    Linear(LinearRegression),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingRegressor),
}

impl FittedModel {
    fn inner(&self) -> &dyn Regressor {
        match self {
            FittedModel::Linear(m) => m,
            FittedModel::RandomForest(m) => m,
            FittedModel::GradientBoosting(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            FittedModel::Linear(m) => m,
            FittedModel::RandomForest(m) => m,
            FittedModel::GradientBoosting(m) => m,
        }
    }
}

impl Regressor for FittedModel {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        self.inner().predict_row(row)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn n_features(&self) -> Option<usize> {
        self.inner().n_features()
    }

    fn validate(&self) -> Result<()> {
        self.inner().validate()
    }
}

impl From<LinearRegression> for FittedModel {
    fn from(m: LinearRegression) -> Self {
        FittedModel::Linear(m)
    }
}

impl From<RandomForest> for FittedModel {
    fn from(m: RandomForest) -> Self {
        FittedModel::RandomForest(m)
    }
}

impl From<GradientBoostingRegressor> for FittedModel {
    fn from(m: GradientBoostingRegressor) -> Self {
        FittedModel::GradientBoosting(m)
    }
}

/// A fitted model plus the metadata needed to serve it safely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: FittedModel,
    /// Feature names in the order the model expects them
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub metrics: Option<RegressionMetrics>,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub crate_version: String,
}

impl ModelArtifact {
    pub fn new(model: FittedModel, feature_names: Vec<String>) -> Self {
        Self {
            model,
            feature_names,
            metrics: None,
            trained_at: Some(Utc::now()),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_metrics(mut self, metrics: RegressionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Model must be fitted, internally consistent, and agree with its own
    /// feature list.
    pub fn validate(&self) -> Result<()> {
        let n = self.model.n_features().ok_or(PredictorError::ModelNotFitted)?;
        if n != self.feature_names.len() {
            return Err(PredictorError::Schema(format!(
                "model expects {} features but artifact lists {}",
                n,
                self.feature_names.len()
            )));
        }
        self.model.validate()
    }

    /// Names and order must match the schema exactly.
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<()> {
        if self.feature_names.as_slice() != schema.features() {
            return Err(PredictorError::Schema(format!(
                "model was trained on {:?} but schema lists {:?}",
                self.feature_names,
                schema.features()
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), model = self.model.name(), "Model artifact saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let artifact: Self = serde_json::from_str(&json)?;
        artifact.validate()?;
        info!(
            path = %path.display(),
            model = artifact.model.name(),
            n_features = artifact.feature_names.len(),
            "Model artifact loaded"
        );
        Ok(artifact)
    }
}
