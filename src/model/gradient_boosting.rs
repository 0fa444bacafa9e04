//! Gradient boosted regression trees
//!
//! Squared-error boosting: every round fits a shallow tree to the current
//! residuals and adds it with shrinkage. Rows and columns are subsampled per
//! round from a seeded RNG, so a given config and dataset always produce the
//! same ensemble.

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::{check_width, Regressor};
use crate::error::{PredictorError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio
    pub colsample_bytree: f64,
    /// Random seed
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.05,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 0.8,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| PredictorError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };

        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "0".into(), "must be > 0"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(invalid("learning_rate", self.learning_rate.to_string(), "must be in (0, 1]"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(invalid("subsample", self.subsample.to_string(), "must be in (0, 1]"));
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return Err(invalid(
                "colsample_bytree",
                self.colsample_bytree.to_string(),
                "must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_prediction: f64,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_prediction: 0.0,
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn sample_indices(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if ratio < 1.0 {
            let sample_size = ((n as f64) * ratio).ceil().max(1.0) as usize;
            indices.shuffle(rng);
            indices.truncate(sample_size);
            indices.sort_unstable();
        }
        indices
    }
}

impl Regressor for GradientBoostingRegressor {
    fn name(&self) -> &'static str {
        "gradient_boosting"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(PredictorError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PredictorError::Data("cannot boost on zero rows".to_string()));
        }

        self.n_features = n_features;
        self.trees.clear();
        self.col_indices_per_tree.clear();
        self.initial_prediction = y.mean().unwrap_or(0.0);
        self.feature_importances = vec![0.0; n_features];

        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        for round in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y - &predictions;

            let row_indices = Self::sample_indices(n_samples, self.config.subsample, &mut rng);
            let col_indices = Self::sample_indices(n_features, self.config.colsample_bytree, &mut rng);

            let x_cols = x.select(Axis(1), &col_indices);
            let x_sub = x_cols.select(Axis(0), &row_indices);
            let y_sub: Array1<f64> = row_indices.iter().map(|&i| residuals[i]).collect();

            let mut tree = DecisionTree::new()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_random_state(self.config.random_state.wrapping_add(round as u64));
            tree.fit(&x_sub, &y_sub)?;

            // Every row moves, not only the sampled ones
            let update = tree.predict(&x_cols)?;
            predictions.scaled_add(self.config.learning_rate, &update);

            if let Some(tree_importance) = tree.feature_importances() {
                for (&col_idx, &imp) in col_indices.iter().zip(tree_importance.iter()) {
                    self.feature_importances[col_idx] += imp;
                }
            }

            self.trees.push(tree);
            self.col_indices_per_tree.push(col_indices);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(PredictorError::ModelNotFitted);
        }
        check_width(self.n_features, row.len())?;

        let mut prediction = self.initial_prediction;
        let mut sub = Vec::with_capacity(self.n_features);
        for (tree, col_indices) in self.trees.iter().zip(&self.col_indices_per_tree) {
            sub.clear();
            sub.extend(col_indices.iter().map(|&c| row[c]));
            prediction += self.config.learning_rate * tree.predict_row(&sub)?;
        }
        Ok(prediction)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PredictorError::ModelNotFitted);
        }
        check_width(self.n_features, x.ncols())?;

        let rows: Vec<f64> = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| self.predict_row(&row.to_vec()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Array1::from_vec(rows))
    }

    fn n_features(&self) -> Option<usize> {
        (!self.trees.is_empty()).then_some(self.n_features)
    }

    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(PredictorError::ModelNotFitted);
        }
        if self.trees.len() != self.col_indices_per_tree.len() {
            return Err(PredictorError::Schema(format!(
                "{} trees but {} column subsets",
                self.trees.len(),
                self.col_indices_per_tree.len()
            )));
        }
        if !self.initial_prediction.is_finite() || !self.config.learning_rate.is_finite() {
            return Err(PredictorError::Schema(
                "boosting model has a non-finite base value or learning rate".to_string(),
            ));
        }
        for (i, (tree, cols)) in self.trees.iter().zip(&self.col_indices_per_tree).enumerate() {
            if let Some(&c) = cols.iter().find(|&&c| c >= self.n_features) {
                return Err(PredictorError::Schema(format!(
                    "tree {} reads column {} but the model has {} features",
                    i, c, self.n_features
                )));
            }
            if tree.n_features() != Some(cols.len()) {
                return Err(PredictorError::Schema(format!(
                    "tree {} expects {:?} features but its column subset has {}",
                    i,
                    tree.n_features(),
                    cols.len()
                )));
            }
            tree.validate()?;
        }
        Ok(())
    }
}
