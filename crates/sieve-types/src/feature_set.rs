use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{SearchError, SieveResult};

/// A distinct subset of the feature universe, identified by column index.
///
/// Indices are kept sorted and unique, so two feature sets with the same
/// members compare (and hash) equal regardless of sampling order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct FeatureSet {
    indices: Vec<usize>,
}

impl FeatureSet {
    /// Build a feature set from indices in any order. Duplicates collapse.
    pub fn new(mut indices: Vec<usize>) -> SieveResult<Self> {
        indices.sort_unstable();
        indices.dedup();
        if indices.is_empty() {
            return Err(SearchError::InvalidFeatureSet {
                message: "a feature set needs at least one feature".to_string(),
            }
            .into());
        }
        Ok(Self { indices })
    }

    /// A single-feature set.
    pub fn singleton(index: usize) -> Self {
        Self {
            indices: vec![index],
        }
    }

    /// The full universe `0..n`.
    pub fn all(n: usize) -> SieveResult<Self> {
        Self::new((0..n).collect())
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    /// Largest index, used to check the set fits a universe.
    pub fn max_index(&self) -> usize {
        self.indices.last().copied().unwrap_or(0)
    }

    /// Check every member lies inside a universe of `n` features.
    pub fn check_universe(&self, n: usize) -> SieveResult<()> {
        if self.max_index() >= n {
            return Err(SearchError::InvalidFeatureSet {
                message: format!("feature index {} outside universe of {n}", self.max_index()),
            }
            .into());
        }
        Ok(())
    }

    /// Binary membership vector over a universe of `n` features.
    pub fn encode(&self, n: usize) -> Vec<f64> {
        let mut row = vec![0.0; n];
        for &i in &self.indices {
            if let Some(slot) = row.get_mut(i) {
                *slot = 1.0;
            }
        }
        row
    }

    /// Member names, in index order.
    pub fn names<'a>(&self, feature_names: &'a [String]) -> Vec<&'a str> {
        self.indices
            .iter()
            .filter_map(|&i| feature_names.get(i).map(String::as_str))
            .collect()
    }
}

impl TryFrom<Vec<usize>> for FeatureSet {
    type Error = crate::errors::SieveError;

    fn try_from(indices: Vec<usize>) -> SieveResult<Self> {
        Self::new(indices)
    }
}

impl From<FeatureSet> for Vec<usize> {
    fn from(set: FeatureSet) -> Self {
        set.indices
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.indices)
    }
}
