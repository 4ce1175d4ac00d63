//! The tabular History representation: the search's return value and its
//! continuation input.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::errors::{DataError, SearchError, SieveResult};
use crate::feature_set::FeatureSet;

/// Column names used by the table's metadata columns. Feature names may not
/// collide with them when the table is stored in columnar form.
pub const RESERVED_COLUMNS: [&str; 4] = ["num_features", "raw_score", "penalized_score", "iteration"];

/// One evaluated feature set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    /// Member feature names, in universe order.
    pub features: Vec<String>,
    pub num_features: usize,
    pub raw_score: f64,
    pub penalized_score: Option<f64>,
    pub iteration: usize,
}

/// All evaluated feature sets plus the universe they were drawn from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryTable {
    pub feature_names: Vec<String>,
    pub rows: Vec<HistoryRow>,
}

impl HistoryTable {
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            feature_names,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Highest iteration recorded, if any rows exist.
    pub fn last_iteration(&self) -> Option<usize> {
        self.rows.iter().map(|r| r.iteration).max()
    }

    pub fn name_index(&self) -> HashMap<&str, usize> {
        self.feature_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect()
    }

    /// Resolve a row's member names back into a feature set.
    pub fn row_feature_set(
        &self,
        row: &HistoryRow,
        index: &HashMap<&str, usize>,
    ) -> SieveResult<FeatureSet> {
        let indices = row
            .features
            .iter()
            .map(|name| {
                index
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| SearchError::UnknownFeature {
                        feature: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let set = FeatureSet::new(indices)?;
        if set.len() != row.num_features {
            return Err(DataError::InvalidFormat {
                message: format!(
                    "row lists {} features but num_features is {}",
                    set.len(),
                    row.num_features
                ),
            }
            .into());
        }
        Ok(set)
    }

    /// Structural checks: known names, consistent counts, unique rows.
    pub fn validate(&self) -> SieveResult<()> {
        let index = self.name_index();
        if index.len() != self.feature_names.len() {
            return Err(DataError::InvalidFormat {
                message: "duplicate feature names in history table".to_string(),
            }
            .into());
        }
        let mut seen = HashSet::new();
        for row in &self.rows {
            let set = self.row_feature_set(row, &index)?;
            if !seen.insert(set) {
                return Err(SearchError::DuplicateFeatureSet {
                    features: row.features.join(","),
                }
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> HistoryTable {
        let mut t = HistoryTable::new(vec!["a".into(), "b".into(), "c".into()]);
        t.rows.push(HistoryRow {
            features: vec!["a".into(), "c".into()],
            num_features: 2,
            raw_score: 0.5,
            penalized_score: None,
            iteration: 0,
        });
        t
    }

    #[test]
    fn valid_table_passes() {
        let t = table();
        assert!(t.validate().is_ok());
        assert_eq!(t.last_iteration(), Some(0));
        let set = t.row_feature_set(&t.rows[0], &t.name_index()).unwrap();
        assert_eq!(set.indices(), &[0, 2]);
    }

    #[test]
    fn unknown_feature_rejected() {
        let mut t = table();
        t.rows[0].features.push("zzz".into());
        t.rows[0].num_features = 3;
        assert!(t.validate().is_err());
    }

    #[test]
    fn duplicate_rows_rejected() {
        let mut t = table();
        let mut dup = t.rows[0].clone();
        dup.features.reverse();
        t.rows.push(dup);
        assert!(t.validate().is_err());
    }

    #[test]
    fn inconsistent_count_rejected() {
        let mut t = table();
        t.rows[0].num_features = 5;
        assert!(t.validate().is_err());
    }
}
