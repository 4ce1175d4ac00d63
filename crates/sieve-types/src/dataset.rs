//! In-memory tabular data with a named feature universe.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::{DataError, SieveResult};
use crate::feature_set::FeatureSet;

/// A feature matrix, its column names and the matching label vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Array2<f64>,
    pub target: Array1<f64>,
}

impl Dataset {
    pub fn new(
        feature_names: Vec<String>,
        features: Array2<f64>,
        target: Array1<f64>,
    ) -> SieveResult<Self> {
        if features.ncols() != feature_names.len() {
            return Err(DataError::ShapeMismatch {
                expected: format!("{} feature columns", feature_names.len()),
                actual: format!("{} columns", features.ncols()),
            }
            .into());
        }
        if features.nrows() != target.len() {
            return Err(DataError::ShapeMismatch {
                expected: format!("target length = {}", features.nrows()),
                actual: format!("target length = {}", target.len()),
            }
            .into());
        }
        if features.nrows() == 0 {
            return Err(DataError::Empty {
                message: "dataset has no rows".to_string(),
            }
            .into());
        }
        let mut seen = HashSet::new();
        for name in &feature_names {
            if !seen.insert(name.as_str()) {
                return Err(DataError::InvalidFormat {
                    message: format!("duplicate feature name: {name}"),
                }
                .into());
            }
        }
        Ok(Self {
            feature_names,
            features,
            target,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Copy of the feature matrix restricted to the given columns.
    pub fn select(&self, set: &FeatureSet) -> SieveResult<Array2<f64>> {
        set.check_universe(self.n_features())?;
        Ok(self.features.select(Axis(1), set.indices()))
    }

    /// Split rows into two datasets: the first `n_first` rows and the rest.
    pub fn split_at(&self, n_first: usize) -> SieveResult<(Self, Self)> {
        if n_first == 0 || n_first >= self.n_rows() {
            return Err(DataError::ShapeMismatch {
                expected: format!("split point in 1..{}", self.n_rows()),
                actual: n_first.to_string(),
            }
            .into());
        }
        let (x_a, x_b) = self.features.view().split_at(Axis(0), n_first);
        let (y_a, y_b) = self.target.view().split_at(Axis(0), n_first);
        Ok((
            Self {
                feature_names: self.feature_names.clone(),
                features: x_a.to_owned(),
                target: y_a.to_owned(),
            },
            Self {
                feature_names: self.feature_names.clone(),
                features: x_b.to_owned(),
                target: y_b.to_owned(),
            },
        ))
    }
}

/// Training and validation data sharing one feature universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainValidSplit {
    pub train: Dataset,
    pub valid: Dataset,
}

impl TrainValidSplit {
    /// Both sides must carry identical column names in identical order.
    pub fn new(train: Dataset, valid: Dataset) -> SieveResult<Self> {
        if train.feature_names != valid.feature_names {
            return Err(DataError::UniverseMismatch {
                message: format!(
                    "train has columns {:?}, validation has {:?}",
                    train.feature_names, valid.feature_names
                ),
            }
            .into());
        }
        Ok(Self { train, valid })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.train.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.train.n_features()
    }
}
