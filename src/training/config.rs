//! Training configuration

use crate::features::ScalerType;
use crate::model::{
    FittedModel, GradientBoostingConfig, GradientBoostingRegressor, LinearRegression, MaxFeatures,
    RandomForest,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One candidate model and its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear {
        #[serde(default)]
        alpha: f64,
    },
    RandomForest {
        n_estimators: usize,
        max_depth: Option<usize>,
        min_samples_leaf: usize,
        max_features: MaxFeatures,
    },
    GradientBoosting(GradientBoostingConfig),
}

impl ModelSpec {
    /// Human-readable label for logs and the training report
    pub fn label(&self) -> String {
        match self {
            ModelSpec::Linear { alpha } if *alpha > 0.0 => format!("ridge(alpha={})", alpha),
            ModelSpec::Linear { .. } => "linear".to_string(),
            ModelSpec::RandomForest {
                n_estimators,
                max_depth,
                ..
            } => match max_depth {
                Some(d) => format!("random_forest(n={}, depth={})", n_estimators, d),
                None => format!("random_forest(n={})", n_estimators),
            },
            ModelSpec::GradientBoosting(c) => format!(
                "gradient_boosting(n={}, lr={}, depth={})",
                c.n_estimators, c.learning_rate, c.max_depth
            ),
        }
    }

    /// Unfitted model seeded with `seed`
    pub fn build(&self, seed: u64) -> FittedModel {
        match self {
            ModelSpec::Linear { alpha } => LinearRegression::new().with_alpha(*alpha).into(),
            ModelSpec::RandomForest {
                n_estimators,
                max_depth,
                min_samples_leaf,
                max_features,
            } => {
                let mut rf = RandomForest::new(*n_estimators)
                    .with_min_samples_leaf(*min_samples_leaf)
                    .with_max_features(*max_features)
                    .with_random_state(seed);
                if let Some(d) = max_depth {
                    rf = rf.with_max_depth(*d);
                }
                rf.into()
            }
            ModelSpec::GradientBoosting(config) => GradientBoostingRegressor::new(GradientBoostingConfig {
                random_state: seed,
                ..config.clone()
            })
            .into(),
        }
    }
}

/// Default candidates: plain and ridge regression, a forest, and two
/// boosting settings
pub fn default_candidates() -> Vec<ModelSpec> {
    vec![
        ModelSpec::Linear { alpha: 0.0 },
        ModelSpec::Linear { alpha: 1.0 },
        ModelSpec::RandomForest {
            n_estimators: 200,
            max_depth: Some(16),
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
        },
        ModelSpec::GradientBoosting(GradientBoostingConfig::default()),
        ModelSpec::GradientBoosting(GradientBoostingConfig {
            n_estimators: 400,
            learning_rate: 0.03,
            max_depth: 4,
            subsample: 0.7,
            colsample_bytree: 0.8,
            ..Default::default()
        }),
    ]
}

/// Configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Target column name
    pub target_column: String,
    /// Feature list; `None` means the default engineered set
    pub features: Option<Vec<String>>,
    /// Scaler fitted on the training split
    pub scaler: ScalerType,
    /// Folds used to rank candidates
    pub cv_folds: usize,
    /// Held-out fraction for the final evaluation
    pub test_size: f64,
    /// Seed for splits and model randomness
    pub seed: u64,
    /// Models compared by cross-validation
    pub candidates: Vec<ModelSpec>,
    /// Directory the artifacts are written to
    pub output_dir: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_column: "SalePrice".to_string(),
            features: None,
            scaler: ScalerType::Standard,
            cv_folds: 5,
            test_size: 0.2,
            seed: 42,
            candidates: default_candidates(),
            output_dir: PathBuf::from("models"),
        }
    }
}

impl TrainingConfig {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
            ..Default::default()
        }
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = Some(features);
        self
    }

    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler = scaler;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<ModelSpec>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn model_path(&self) -> PathBuf {
        self.output_dir.join("model.json")
    }

    pub fn schema_path(&self) -> PathBuf {
        self.output_dir.join("feature_schema.json")
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join("training_report.json")
    }
}
