//! Append-only store of every evaluated feature set.

use std::collections::{HashMap, HashSet};

use sieve_types::{
    EvaluationRecord, FeatureSet, HistoryRow, HistoryTable, SearchError, SieveResult,
};

use crate::penalty::PenaltyScorer;

/// Evaluation records keyed by feature-set identity.
///
/// Records are only ever appended; a feature set can appear at most once.
#[derive(Debug, Clone)]
pub struct History {
    feature_names: Vec<String>,
    records: Vec<EvaluationRecord>,
    seen: HashSet<FeatureSet>,
}

impl History {
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            feature_names,
            records: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Adopt a previously returned table as the starting state.
    ///
    /// Fails with a schema mismatch when the table's universe size differs
    /// from `feature_names`, and with an unknown-feature error when a row
    /// names a column outside it.
    pub fn from_table(table: &HistoryTable, feature_names: Vec<String>) -> SieveResult<Self> {
        if table.feature_names.len() != feature_names.len() {
            return Err(SearchError::SchemaMismatch {
                expected: feature_names.len(),
                actual: table.feature_names.len(),
            }
            .into());
        }

        let mut history = Self::new(feature_names);
        let index: HashMap<&str, usize> = history
            .feature_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let mut records = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            let set = table.row_feature_set(row, &index)?;
            records.push(EvaluationRecord::new(
                set,
                row.raw_score,
                row.penalized_score,
                row.iteration,
            ));
        }
        for record in records {
            history.insert(record)?;
        }
        Ok(history)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, set: &FeatureSet) -> bool {
        self.seen.contains(set)
    }

    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    /// Highest iteration among stored records.
    pub fn last_iteration(&self) -> Option<usize> {
        self.records.iter().map(|r| r.iteration).max()
    }

    /// Append a record. Duplicates are rejected, never double-recorded.
    pub fn insert(&mut self, record: EvaluationRecord) -> SieveResult<()> {
        record.feature_set.check_universe(self.n_features())?;
        if !self.seen.insert(record.feature_set.clone()) {
            return Err(SearchError::DuplicateFeatureSet {
                features: record.feature_set.to_string(),
            }
            .into());
        }
        self.records.push(record);
        Ok(())
    }

    /// Best record under `scorer`, re-deriving penalized scores from raw
    /// scores so adopted records rank consistently with new ones.
    pub fn best(&self, scorer: &PenaltyScorer) -> Option<&EvaluationRecord> {
        self.records.iter().max_by(|a, b| {
            scorer
                .key_for(a.raw_score, a.num_features)
                .total_cmp(&scorer.key_for(b.raw_score, b.num_features))
        })
    }

    /// Number of distinct raw-score values, used to detect a constant target.
    pub fn distinct_scores(&self) -> usize {
        let mut scores: Vec<u64> = self.records.iter().map(|r| r.raw_score.to_bits()).collect();
        scores.sort_unstable();
        scores.dedup();
        scores.len()
    }

    /// Tabular form: the search's output and a valid continuation input.
    pub fn to_table(&self) -> HistoryTable {
        let rows = self
            .records
            .iter()
            .map(|record| HistoryRow {
                features: record
                    .feature_set
                    .names(&self.feature_names)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                num_features: record.num_features,
                raw_score: record.raw_score,
                penalized_score: record.penalized_score,
                iteration: record.iteration,
            })
            .collect();
        HistoryTable {
            feature_names: self.feature_names.clone(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_types::{ScoreDirection, SieveError};

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    fn record(indices: &[usize], score: f64) -> EvaluationRecord {
        EvaluationRecord::new(FeatureSet::new(indices.to_vec()).unwrap(), score, None, 0)
    }

    #[test]
    fn rejects_duplicates() {
        let mut history = History::new(names(4));
        history.insert(record(&[0, 1], 0.5)).unwrap();
        let err = history.insert(record(&[1, 0], 0.9)).unwrap_err();
        assert!(matches!(
            err,
            SieveError::Search(SearchError::DuplicateFeatureSet { .. })
        ));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn rejects_out_of_universe() {
        let mut history = History::new(names(2));
        assert!(history.insert(record(&[2], 0.5)).is_err());
    }

    #[test]
    fn best_respects_direction_and_penalty() {
        let mut history = History::new(names(5));
        history.insert(record(&[0], 1.0)).unwrap();
        history.insert(record(&[0, 1, 2, 3], 1.3)).unwrap();

        let raw = PenaltyScorer::new(None, ScoreDirection::HigherIsBetter);
        assert_eq!(history.best(&raw).unwrap().num_features, 4);

        let penalized = PenaltyScorer::new(Some(0.2), ScoreDirection::HigherIsBetter);
        assert_eq!(history.best(&penalized).unwrap().num_features, 1);

        let lower = PenaltyScorer::new(None, ScoreDirection::LowerIsBetter);
        assert_eq!(history.best(&lower).unwrap().raw_score, 1.0);
    }

    #[test]
    fn table_round_trip_preserves_records() {
        let mut history = History::new(names(3));
        history.insert(record(&[2, 0], 0.25)).unwrap();
        history
            .insert(EvaluationRecord::new(
                FeatureSet::new(vec![1]).unwrap(),
                0.5,
                Some(0.4),
                3,
            ))
            .unwrap();

        let table = history.to_table();
        assert_eq!(table.rows[0].features, vec!["f0", "f2"]);
        assert_eq!(table.rows[1].penalized_score, Some(0.4));

        let restored = History::from_table(&table, names(3)).unwrap();
        assert_eq!(restored.records(), history.records());
        assert_eq!(restored.last_iteration(), Some(3));
    }

    #[test]
    fn universe_size_mismatch_is_schema_error() {
        let history = History::new(names(3));
        let err = History::from_table(&history.to_table(), names(4)).unwrap_err();
        assert!(matches!(
            err,
            SieveError::Search(SearchError::SchemaMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn distinct_scores_counts_values() {
        let mut history = History::new(names(3));
        history.insert(record(&[0], 1.0)).unwrap();
        history.insert(record(&[1], 1.0)).unwrap();
        assert_eq!(history.distinct_scores(), 1);
        history.insert(record(&[2], 2.0)).unwrap();
        assert_eq!(history.distinct_scores(), 2);
    }
}
