//! Train/test splitting and k-fold cross-validation

use crate::error::{PredictorError, Result};
use crate::model::{FittedModel, RegressionMetrics, Regressor};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Shuffled train/test split. `test_size` is the held-out fraction in `[0, 1)`.
pub fn train_test_split(n_samples: usize, test_size: f64, seed: u64) -> Result<CVSplit> {
    if !(0.0..1.0).contains(&test_size) {
        return Err(PredictorError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must be in [0, 1)".to_string(),
        });
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = (n_samples as f64 * test_size).round() as usize;
    let test_indices = indices.split_off(n_samples - n_test);
    Ok(CVSplit {
        train_indices: indices,
        test_indices,
        fold_idx: 0,
    })
}

/// Shuffled k-fold splitter
pub struct KFold {
    n_splits: usize,
    random_state: u64,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            random_state: 42,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(PredictorError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: n_splits.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if n_samples < n_splits {
            return Err(PredictorError::Data(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        indices.shuffle(&mut rng);

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();
            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }
}

/// Per-fold scores for one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    pub fold_rmse: Vec<f64>,
    pub mean_rmse: f64,
    pub std_rmse: f64,
    pub mean_r2: f64,
}

impl CVResults {
    fn from_folds(folds: &[RegressionMetrics]) -> Self {
        let n = folds.len().max(1) as f64;
        let fold_rmse: Vec<f64> = folds.iter().map(|m| m.rmse).collect();
        let mean_rmse = fold_rmse.iter().sum::<f64>() / n;
        let std_rmse = (fold_rmse.iter().map(|r| (r - mean_rmse).powi(2)).sum::<f64>() / n).sqrt();
        let mean_r2 = folds.iter().map(|m| m.r2).sum::<f64>() / n;
        Self {
            fold_rmse,
            mean_rmse,
            std_rmse,
            mean_r2,
        }
    }
}

/// Fit a fresh copy of `template` on each training fold and score it on the
/// held-out fold.
pub fn cross_validate(
    template: &FittedModel,
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CVSplit],
) -> Result<CVResults> {
    let mut folds = Vec::with_capacity(splits.len());
    for split in splits {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_val = x.select(Axis(0), &split.test_indices);
        let y_val = y.select(Axis(0), &split.test_indices);

        let mut model = template.clone();
        model.fit(&x_train, &y_train)?;
        let predictions = model.predict(&x_val)?;
        folds.push(RegressionMetrics::compute(&y_val, &predictions));
    }
    Ok(CVResults::from_folds(&folds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinearRegression;
    use std::collections::HashSet;

    #[test]
    fn test_kfold_covers_every_sample_once() {
        let splits = KFold::new(5).with_random_state(7).split(23).unwrap();
        assert_eq!(splits.len(), 5);

        let mut seen = HashSet::new();
        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 23);
            for &i in &split.test_indices {
                assert!(seen.insert(i), "index {} in two folds", i);
            }
        }
        assert_eq!(seen.len(), 23);
        assert_eq!(splits[0].test_indices.len(), 5);
        assert_eq!(splits[4].test_indices.len(), 4);
    }

    #[test]
    fn test_kfold_rejects_bad_params() {
        assert!(KFold::new(1).split(10).is_err());
        assert!(KFold::new(5).split(3).is_err());
    }

    #[test]
    fn test_train_test_split() {
        let split = train_test_split(100, 0.2, 42).unwrap();
        assert_eq!(split.test_indices.len(), 20);
        assert_eq!(split.train_indices.len(), 80);

        let again = train_test_split(100, 0.2, 42).unwrap();
        assert_eq!(split.test_indices, again.test_indices);

        assert!(train_test_split(100, 0.0, 42).unwrap().test_indices.is_empty());
        assert!(train_test_split(100, 1.0, 42).is_err());
    }

    #[test]
    fn test_cross_validate_linear() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| (i * (j + 2)) as f64 % 7.0 + i as f64);
        let y: Array1<f64> = x.outer_iter().map(|r| 2.0 * r[0] - r[1] + 3.0).collect();
        let splits = KFold::new(3).split(30).unwrap();

        let results = cross_validate(&LinearRegression::new().into(), &x, &y, &splits).unwrap();
        assert_eq!(results.fold_rmse.len(), 3);
        assert!(results.mean_rmse < 1e-6);
    }
}
