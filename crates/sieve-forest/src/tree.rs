//! CART regression tree (squared-error criterion).

use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use sieve_types::{usize_arg, Model, ModelError, ParamMap, SieveResult};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
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

impl TreeNode {
    fn predict_row(&self, row: ndarray::ArrayView1<'_, f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Regression tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features examined at each split (all when unset)
    pub max_features: Option<usize>,
    /// Seed for the per-split feature subsampling
    pub random_state: Option<u64>,
    n_features: usize,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-fit settings resolved from the struct fields and the fit arguments.
struct GrowParams {
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: usize,
}

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Depth of the fitted tree (0 for a single leaf).
    pub fn depth(&self) -> Option<usize> {
        self.root.as_ref().map(TreeNode::depth)
    }

    /// Fit on an explicit row subset, used by the forest for bootstrap samples.
    pub(crate) fn fit_rows(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        args: &ParamMap,
    ) -> SieveResult<()> {
        if x.nrows() != y.len() {
            return Err(ModelError::FitFailed {
                message: format!("x has {} rows, y has {}", x.nrows(), y.len()),
            }
            .into());
        }
        if rows.is_empty() || x.ncols() == 0 {
            return Err(ModelError::FitFailed {
                message: "cannot fit a tree on empty data".to_string(),
            }
            .into());
        }
        if let Some(&i) = rows.iter().find(|&&i| !y[i].is_finite()) {
            return Err(ModelError::FitFailed {
                message: format!("non-finite target at row {i}"),
            }
            .into());
        }
        if let Some(&i) = rows
            .iter()
            .find(|&&i| x.row(i).iter().any(|v| !v.is_finite()))
        {
            return Err(ModelError::FitFailed {
                message: format!("non-finite feature value at row {i}"),
            }
            .into());
        }

        let params = GrowParams {
            max_depth: usize_arg(args, "max_depth")?.or(self.max_depth),
            min_samples_split: self.min_samples_split.max(2),
            min_samples_leaf: usize_arg(args, "min_samples_leaf")?
                .unwrap_or(self.min_samples_leaf)
                .max(1),
            max_features: self.max_features.unwrap_or(x.ncols()).clamp(1, x.ncols()),
        };

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(42));
        self.n_features = x.ncols();
        self.root = Some(build_node(x, y, rows, 0, &params, &mut rng));
        Ok(())
    }
}

fn leaf(y: &Array1<f64>, rows: &[usize]) -> TreeNode {
    let sum: f64 = rows.iter().map(|&i| y[i]).sum();
    TreeNode::Leaf {
        value: sum / rows.len() as f64,
        n_samples: rows.len(),
    }
}

fn build_node(
    x: &Array2<f64>,
    y: &Array1<f64>,
    rows: &[usize],
    depth: usize,
    params: &GrowParams,
    rng: &mut ChaCha8Rng,
) -> TreeNode {
    let n_samples = rows.len();
    let first = y[rows[0]];
    let is_pure = rows.iter().all(|&i| y[i] == first);

    let should_stop = n_samples < params.min_samples_split
        || n_samples < 2 * params.min_samples_leaf
        || params.max_depth.is_some_and(|d| depth >= d)
        || is_pure;
    if should_stop {
        return leaf(y, rows);
    }

    let candidates = sample(rng, x.ncols(), params.max_features).into_vec();
    let Some((feature_idx, threshold)) = best_split(x, y, rows, &candidates, params) else {
        return leaf(y, rows);
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .partition(|&&i| x[[i, feature_idx]] <= threshold);
    if left_rows.is_empty() || right_rows.is_empty() {
        return leaf(y, rows);
    }

    TreeNode::Split {
        feature_idx,
        threshold,
        left: Box::new(build_node(x, y, &left_rows, depth + 1, params, rng)),
        right: Box::new(build_node(x, y, &right_rows, depth + 1, params, rng)),
        n_samples,
    }
}

/// Best (feature, threshold) by squared-error reduction, scanning each
/// candidate feature once over its sorted values with running sums.
fn best_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    rows: &[usize],
    candidates: &[usize],
    params: &GrowParams,
) -> Option<(usize, f64)> {
    let n = rows.len();
    let total_sum: f64 = rows.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = rows.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;

    let mut best: Option<(usize, f64, f64)> = None;
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

    for &feature_idx in candidates {
        pairs.clear();
        pairs.extend(rows.iter().map(|&i| (x[[i, feature_idx]], y[i])));
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..n - 1 {
            let (value, target) = pairs[k];
            left_sum += target;
            left_sq += target * target;

            let next_value = pairs[k + 1].0;
            if next_value <= value || !value.is_finite() || !next_value.is_finite() {
                continue;
            }
            let left_count = k + 1;
            let right_count = n - left_count;
            if left_count < params.min_samples_leaf || right_count < params.min_samples_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let left_sse = left_sq - left_sum * left_sum / left_count as f64;
            let right_sse = right_sq - right_sum * right_sum / right_count as f64;
            let gain = parent_sse - left_sse - right_sse;

            if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                best = Some((feature_idx, (value + next_value) / 2.0, gain));
            }
        }
    }

    best.map(|(feature_idx, threshold, _)| (feature_idx, threshold))
}

impl Model for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, args: &ParamMap) -> SieveResult<()> {
        let rows: Vec<usize> = (0..x.nrows()).collect();
        self.fit_rows(x, y, &rows, args)
    }

    fn predict(&self, x: &Array2<f64>) -> SieveResult<Array1<f64>> {
        let root = self.root.as_ref().ok_or(ModelError::NotFitted)?;
        if x.ncols() != self.n_features {
            return Err(ModelError::PredictFailed {
                message: format!(
                    "fitted on {} features, got {}",
                    self.n_features,
                    x.ncols()
                ),
            }
            .into());
        }
        Ok(x.rows().into_iter().map(|row| root.predict_row(row)).collect())
    }

    fn name(&self) -> &str {
        "decision_tree"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use sieve_types::{ParameterValue, SieveError};

    #[test]
    fn fits_step_function_exactly() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![1.0, 1.0, 5.0, 5.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y, &ParamMap::new()).unwrap();

        let pred = tree.predict(&x).unwrap();
        assert_eq!(pred, y);
        assert_eq!(tree.depth(), Some(1));
    }

    #[test]
    fn picks_informative_binary_feature() {
        // Column 1 determines the target; column 0 is noise.
        let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 10.0, 10.0];

        let mut tree = DecisionTreeRegressor::new().with_max_depth(1);
        tree.fit(&x, &y, &ParamMap::new()).unwrap();

        let pred = tree.predict(&array![[1.0, 1.0], [1.0, 0.0]]).unwrap();
        assert_eq!(pred, array![10.0, 0.0]);
    }

    #[test]
    fn max_depth_argument_overrides_field() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 2.0, 3.0];
        let mut args = ParamMap::new();
        args.insert("max_depth".into(), ParameterValue::Int(0));

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y, &args).unwrap();
        assert_eq!(tree.depth(), Some(0));
        assert_eq!(tree.predict(&array![[0.0]]).unwrap(), array![1.5]);
    }

    #[test]
    fn nan_feature_is_a_fit_error() {
        let x = array![[0.0], [1.0], [f64::NAN]];
        let y = array![0.0, 0.0, 5.0];

        let mut tree = DecisionTreeRegressor::new();
        let err = tree.fit(&x, &y, &ParamMap::new()).unwrap_err();
        assert!(err.is_candidate_local());
        assert!(matches!(err, SieveError::Model(ModelError::FitFailed { .. })));
        assert!(!tree.is_fitted());
    }

    #[test]
    fn infinite_target_is_a_fit_error() {
        let mut tree = DecisionTreeRegressor::new();
        let err = tree
            .fit(&array![[0.0], [1.0]], &array![0.0, f64::INFINITY], &ParamMap::new())
            .unwrap_err();
        assert!(err.is_candidate_local());
    }

    #[test]
    fn predict_before_fit_fails() {
        let tree = DecisionTreeRegressor::new();
        assert!(tree.predict(&array![[1.0]]).is_err());
    }

    #[test]
    fn predict_with_wrong_width_fails() {
        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&array![[0.0], [1.0]], &array![0.0, 1.0], &ParamMap::new())
            .unwrap();
        assert!(tree.predict(&array![[0.0, 1.0]]).is_err());
    }
}
