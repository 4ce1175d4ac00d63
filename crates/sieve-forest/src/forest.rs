//! Random forest regressor: bagged regression trees averaged at predict time.

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use sieve_types::{usize_arg, Model, ModelError, ParamMap, SieveResult};

use crate::tree::DecisionTreeRegressor;

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<DecisionTreeRegressor>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features examined per split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random state
    pub random_state: Option<u64>,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            random_state: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Model for RandomForestRegressor {
    /// Recognised arguments: `n_estimators`, `max_depth`, `min_samples_leaf`.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, args: &ParamMap) -> SieveResult<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(ModelError::FitFailed {
                message: format!("x has {} rows, y has {}", n_samples, y.len()),
            }
            .into());
        }
        if n_samples == 0 {
            return Err(ModelError::FitFailed {
                message: "cannot fit a forest on zero rows".to_string(),
            }
            .into());
        }

        // every row, not only the ones a bootstrap draw picks
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(ModelError::FitFailed {
                message: "non-finite value in training data".to_string(),
            }
            .into());
        }

        let n_estimators = usize_arg(args, "n_estimators")?
            .unwrap_or(self.n_estimators)
            .max(1);
        let max_depth = usize_arg(args, "max_depth")?.or(self.max_depth);
        let min_samples_leaf = usize_arg(args, "min_samples_leaf")?.unwrap_or(self.min_samples_leaf);
        let max_features = self.max_features.resolve(x.ncols());

        let base_seed = self.random_state.unwrap_or(42);
        let tree_args = ParamMap::new();
        let mut trees = Vec::with_capacity(n_estimators);

        for tree_idx in 0..n_estimators {
            let seed = base_seed.wrapping_add(tree_idx as u64);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            let rows: Vec<usize> = if self.bootstrap {
                (0..n_samples).map(|_| rng.random_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            let mut tree = DecisionTreeRegressor::new()
                .with_min_samples_leaf(min_samples_leaf)
                .with_max_features(max_features)
                .with_random_state(rng.random());
            tree.max_depth = max_depth;
            tree.fit_rows(x, y, &rows, &tree_args)?;
            trees.push(tree);
        }

        self.trees = trees;
        Ok(())
    }

    /// Mean of the per-tree predictions.
    fn predict(&self, x: &Array2<f64>) -> SieveResult<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted.into());
        }
        let mut total = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            total += &tree.predict(x)?;
        }
        Ok(total / self.trees.len() as f64)
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}
