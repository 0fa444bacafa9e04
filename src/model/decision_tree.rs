//! CART regression tree

use super::{check_width, Regressor};
use crate::error::{PredictorError, Result};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Hard cap on depth. Artifacts are nested JSON and must stay well inside
/// the deserializer's recursion limit.
pub const MAX_TREE_DEPTH: usize = 32;

/// Nodes below this size scan candidate features sequentially
const PARALLEL_SPLIT_MIN: usize = 2048;

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Regression tree grown on squared error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth (capped at [`MAX_TREE_DEPTH`])
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split; all when `None`
    pub max_features: Option<usize>,
    /// Seed for the per-split feature subset
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: 0,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn depth_limit(&self) -> usize {
        self.max_depth.unwrap_or(MAX_TREE_DEPTH).min(MAX_TREE_DEPTH)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let (sum, sq_sum) = indices
            .iter()
            .fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]));
        let mean = sum / n_samples as f64;
        let parent_sse = sq_sum - sum * sum / n_samples as f64;

        let first = y[indices[0]];
        let is_pure = indices.iter().all(|&i| (y[i] - first).abs() < 1e-10);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || depth >= self.depth_limit()
            || is_pure;

        if should_stop {
            return TreeNode::Leaf { value: mean, n_samples };
        }

        let features = self.candidate_features(rng);
        let best = match self.find_best_split(x, y, indices, &features, parent_sse) {
            Some(best) => best,
            None => return TreeNode::Leaf { value: mean, n_samples },
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += best.gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, rng, importances));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, rng, importances));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut picked = rand::seq::index::sample(rng, self.n_features, k).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Sort-and-sweep search for the split with the largest SSE reduction
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent_sse: f64,
    ) -> Option<SplitCandidate> {
        let scan = |&feature_idx: &usize| -> Option<SplitCandidate> {
            let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let n = pairs.len();
            let total_sum: f64 = pairs.iter().map(|p| p.1).sum();
            let total_sq: f64 = pairs.iter().map(|p| p.1 * p.1).sum();

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            let mut best: Option<SplitCandidate> = None;

            for k in 0..n - 1 {
                left_sum += pairs[k].1;
                left_sq += pairs[k].1 * pairs[k].1;

                // Equal values cannot be separated by a threshold
                if pairs[k].0 == pairs[k + 1].0 {
                    continue;
                }

                let left_n = k + 1;
                let right_n = n - left_n;
                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let child_sse = (left_sq - left_sum * left_sum / left_n as f64)
                    + (right_sq - right_sum * right_sum / right_n as f64);
                let gain = parent_sse - child_sse;

                if gain > best.map_or(1e-12, |b| b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: (pairs[k].0 + pairs[k + 1].0) / 2.0,
                        gain,
                    });
                }
            }
            best
        };

        let per_feature: Vec<Option<SplitCandidate>> = if indices.len() >= PARALLEL_SPLIT_MIN {
            features.par_iter().map(scan).collect()
        } else {
            features.iter().map(scan).collect()
        };

        // Strict comparison keeps the lowest feature index on ties
        per_feature.into_iter().flatten().fold(None, |best: Option<SplitCandidate>, c| match best {
            Some(b) if b.gain >= c.gain => Some(b),
            _ => Some(c),
        })
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    /// Normalized SSE reduction per feature
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn get_depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        fn count_leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
            }
        }
        self.root.as_ref().map_or(0, count_leaves)
    }
}

impl Regressor for DecisionTree {
    fn name(&self) -> &'static str {
        "decision_tree"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PredictorError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(PredictorError::Data(format!(
                "cannot grow a tree on a {}x{} matrix",
                n_samples, n_features
            )));
        }

        self.n_features = n_features;
        let mut importances = vec![0.0; n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let indices: Vec<usize> = (0..n_samples).collect();

        self.root = Some(self.build_tree(x, y, &indices, 0, &mut rng, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let mut node = self.root.as_ref().ok_or(PredictorError::ModelNotFitted)?;
        check_width(self.n_features, row.len())?;

        loop {
            match node {
                TreeNode::Leaf { value, .. } => return Ok(*value),
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn n_features(&self) -> Option<usize> {
        self.root.as_ref().map(|_| self.n_features)
    }

    fn validate(&self) -> Result<()> {
        let root = self.root.as_ref().ok_or(PredictorError::ModelNotFitted)?;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match node {
                TreeNode::Leaf { value, .. } => {
                    if !value.is_finite() {
                        return Err(PredictorError::Schema(format!(
                            "tree leaf value {} is not finite",
                            value
                        )));
                    }
                }
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    if *feature_idx >= self.n_features {
                        return Err(PredictorError::Schema(format!(
                            "tree splits on feature {} but has only {} features",
                            feature_idx, self.n_features
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(PredictorError::Schema(format!(
                            "tree split threshold {} is not finite",
                            threshold
                        )));
                    }
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        Ok(())
    }
}
