//! Surrogate cost model: a random forest over binary membership vectors.

use ndarray::{Array1, Array2};
use tracing::debug;

use sieve_forest::RandomForestRegressor;
use sieve_types::{internal_error, FeatureSet, Model, ParamMap, SearchError, SieveResult};

use crate::config::SurrogateConfig;
use crate::history::History;

/// Encode feature sets as rows of a 0/1 matrix over `n_features` columns.
/// A set with an index outside the universe is an error.
pub fn encode_sets<'a, I>(sets: I, n_features: usize) -> SieveResult<Array2<f64>>
where
    I: IntoIterator<Item = &'a FeatureSet>,
{
    let mut values = Vec::new();
    let mut rows = 0;
    for set in sets {
        set.check_universe(n_features)?;
        values.extend(set.encode(n_features));
        rows += 1;
    }
    Array2::from_shape_vec((rows, n_features), values)
        .map_err(|e| internal_error!("encoding {} feature sets: {}", rows, e))
}

/// Fits a fresh surrogate from a History snapshot.
#[derive(Debug, Clone)]
pub struct SurrogateTrainer {
    config: SurrogateConfig,
}

impl SurrogateTrainer {
    pub fn new(config: SurrogateConfig) -> Self {
        Self { config }
    }

    /// Train on every record's raw score. Penalized scores are never the
    /// target.
    ///
    /// Fails with `DegenerateHistory` when there are fewer than two rows or
    /// the raw scores are all identical.
    pub fn train(&self, history: &History, seed: u64) -> SieveResult<FittedSurrogate> {
        if history.len() < 2 {
            return Err(SearchError::DegenerateHistory {
                message: format!("{} row(s) in history", history.len()),
            }
            .into());
        }
        if history.distinct_scores() < 2 {
            return Err(SearchError::DegenerateHistory {
                message: "constant target".to_string(),
            }
            .into());
        }

        let n_features = history.n_features();
        let x = encode_sets(history.records().iter().map(|r| &r.feature_set), n_features)?;
        let y: Array1<f64> = history.records().iter().map(|r| r.raw_score).collect();

        let mut forest = RandomForestRegressor::new(self.config.n_estimators)
            .with_min_samples_leaf(self.config.min_samples_leaf)
            .with_random_state(seed);
        forest.max_depth = self.config.max_depth;
        forest.fit(&x, &y, &ParamMap::new())?;

        debug!(
            "Surrogate fitted on {} rows with {} trees",
            history.len(),
            forest.n_trees()
        );
        Ok(FittedSurrogate { forest, n_features })
    }
}

/// A surrogate trained for exactly one iteration.
#[derive(Debug, Clone)]
pub struct FittedSurrogate {
    forest: RandomForestRegressor,
    n_features: usize,
}

impl FittedSurrogate {
    /// One predicted raw score per candidate, in input order.
    pub fn predict(&self, candidates: &[FeatureSet]) -> SieveResult<Vec<f64>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let x = encode_sets(candidates, self.n_features)?;
        Ok(self.forest.predict(&x)?.to_vec())
    }
}

#[cfg(test)]
impl FittedSurrogate {
    /// A surrogate whose forest was never fitted, so every prediction fails.
    pub(crate) fn unfitted(n_features: usize) -> Self {
        Self {
            forest: RandomForestRegressor::new(1),
            n_features,
        }
    }
}
