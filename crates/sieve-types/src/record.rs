//! Evaluation records and per-iteration aggregates.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::feature_set::FeatureSet;

/// How raw scores are interpreted by every downstream comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDirection {
    HigherIsBetter,
    LowerIsBetter,
}

impl Default for ScoreDirection {
    fn default() -> Self {
        Self::HigherIsBetter
    }
}

impl ScoreDirection {
    pub fn from_higher_is_better(higher_is_better: bool) -> Self {
        if higher_is_better {
            Self::HigherIsBetter
        } else {
            Self::LowerIsBetter
        }
    }

    pub fn higher_is_better(self) -> bool {
        matches!(self, Self::HigherIsBetter)
    }

    /// Map a score onto a scale where larger is always better.
    pub fn comparable_key(self, score: f64) -> f64 {
        match self {
            Self::HigherIsBetter => score,
            Self::LowerIsBetter => -score,
        }
    }

    /// True when `candidate` strictly improves on `incumbent`.
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::HigherIsBetter => candidate > incumbent,
            Self::LowerIsBetter => candidate < incumbent,
        }
    }

    /// Ordering of two scores where `Greater` means "better".
    pub fn compare(self, a: f64, b: f64) -> Ordering {
        self.comparable_key(a).total_cmp(&self.comparable_key(b))
    }
}

/// One real evaluation of a feature set. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub feature_set: FeatureSet,
    pub raw_score: f64,
    pub num_features: usize,
    /// Present only when a penalty coefficient was configured.
    pub penalized_score: Option<f64>,
    /// Iteration that produced the record; 0 is the seeding phase.
    pub iteration: usize,
}

impl EvaluationRecord {
    pub fn new(
        feature_set: FeatureSet,
        raw_score: f64,
        penalized_score: Option<f64>,
        iteration: usize,
    ) -> Self {
        let num_features = feature_set.len();
        Self {
            feature_set,
            raw_score,
            num_features,
            penalized_score,
            iteration,
        }
    }

    /// The score used for ranking and best-tracking.
    pub fn effective_score(&self) -> f64 {
        self.penalized_score.unwrap_or(self.raw_score)
    }
}

/// Aggregate over the candidates evaluated in one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationStats {
    pub iteration: usize,
    pub cumulative_evaluated: usize,
    /// Number of candidates that made it into History this iteration.
    pub new_evaluated: usize,
    pub mean_new_score: Option<f64>,
    pub max_new_score: Option<f64>,
    /// True when the surrogate could not be trained and selection was random.
    pub used_fallback: bool,
}

impl IterationStats {
    pub fn from_scores(
        iteration: usize,
        cumulative_evaluated: usize,
        new_scores: &[f64],
        used_fallback: bool,
    ) -> Self {
        let mean_new_score = if new_scores.is_empty() {
            None
        } else {
            Some(new_scores.iter().sum::<f64>() / new_scores.len() as f64)
        };
        let max_new_score = new_scores.iter().copied().reduce(f64::max);
        Self {
            iteration,
            cumulative_evaluated,
            new_evaluated: new_scores.len(),
            mean_new_score,
            max_new_score,
            used_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_comparable_key() {
        assert_eq!(ScoreDirection::HigherIsBetter.comparable_key(2.5), 2.5);
        assert_eq!(ScoreDirection::LowerIsBetter.comparable_key(2.5), -2.5);
        assert!(ScoreDirection::LowerIsBetter.improves(0.1, 0.2));
        assert!(!ScoreDirection::HigherIsBetter.improves(0.1, 0.2));
        assert_eq!(
            ScoreDirection::LowerIsBetter.compare(0.1, 0.2),
            Ordering::Greater
        );
    }

    #[test]
    fn record_counts_features() {
        let set = FeatureSet::new(vec![0, 2, 4]).unwrap();
        let record = EvaluationRecord::new(set, 0.8, Some(0.5), 1);
        assert_eq!(record.num_features, 3);
        assert_eq!(record.effective_score(), 0.5);
    }

    #[test]
    fn stats_from_scores() {
        let stats = IterationStats::from_scores(2, 10, &[1.0, 3.0, 2.0], false);
        assert_eq!(stats.new_evaluated, 3);
        assert_eq!(stats.mean_new_score, Some(2.0));
        assert_eq!(stats.max_new_score, Some(3.0));

        let empty = IterationStats::from_scores(3, 10, &[], true);
        assert_eq!(empty.mean_new_score, None);
        assert_eq!(empty.max_new_score, None);
        assert!(empty.used_fallback);
    }

    #[test]
    fn direction_serializes_snake_case() {
        let json = serde_json::to_string(&ScoreDirection::LowerIsBetter).unwrap();
        assert_eq!(json, "\"lower_is_better\"");
    }
}
