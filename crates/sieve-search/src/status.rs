//! Search run tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sieve_types::{EvaluationRecord, FeatureSet};

use crate::penalty::PenaltyScorer;

/// Unique search run identifier.
pub type SearchId = Uuid;

/// Lifecycle state for a search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// The best feature set seen so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCandidate {
    pub feature_set: FeatureSet,
    pub features: Vec<String>,
    pub raw_score: f64,
    /// Raw score with the current penalty applied.
    pub penalized_score: f64,
    pub iteration: usize,
}

/// Aggregate status of a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStatus {
    pub id: SearchId,
    pub state: SearchState,
    pub scorer: PenaltyScorer,
    pub iterations_completed: usize,
    pub candidates_evaluated: usize,
    pub candidates_failed: usize,
    /// Iterations that fell back to random selection.
    pub fallback_iterations: usize,
    pub best: Option<BestCandidate>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SearchStatus {
    pub fn new(scorer: PenaltyScorer) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SearchState::Pending,
            scorer,
            iterations_completed: 0,
            candidates_evaluated: 0,
            candidates_failed: 0,
            fallback_iterations: 0,
            best: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = SearchState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = SearchState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = SearchState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Replace the best candidate if `record` strictly improves on it.
    /// Returns true when it did.
    pub fn update_best(&mut self, record: &EvaluationRecord, feature_names: &[String]) -> bool {
        let key = self.scorer.key_for(record.raw_score, record.num_features);
        let improves = match &self.best {
            None => true,
            Some(current) => key > self.scorer.comparable_key(current.penalized_score),
        };
        if improves {
            self.best = Some(BestCandidate {
                feature_set: record.feature_set.clone(),
                features: record
                    .feature_set
                    .names(feature_names)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                raw_score: record.raw_score,
                penalized_score: self
                    .scorer
                    .penalized_score(record.raw_score, record.num_features),
                iteration: record.iteration,
            });
        }
        improves
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SearchState::Completed | SearchState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_types::ScoreDirection;

    fn record(indices: &[usize], raw: f64) -> EvaluationRecord {
        EvaluationRecord::new(FeatureSet::new(indices.to_vec()).unwrap(), raw, None, 1)
    }

    fn names() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn lifecycle() {
        let mut status = SearchStatus::new(PenaltyScorer::new(None, ScoreDirection::HigherIsBetter));
        assert_eq!(status.state, SearchState::Pending);
        status.mark_running();
        assert!(status.started_at.is_some());
        assert!(!status.is_finished());
        status.mark_failed("boom".into());
        assert!(status.is_finished());
        assert_eq!(status.error.as_deref(), Some("boom"));
    }

    #[test]
    fn best_follows_direction() {
        let mut status = SearchStatus::new(PenaltyScorer::new(None, ScoreDirection::LowerIsBetter));
        assert!(status.update_best(&record(&[0], 0.5), &names()));
        assert!(!status.update_best(&record(&[1], 0.9), &names()));
        assert!(status.update_best(&record(&[2], 0.1), &names()));
        let best = status.best.unwrap();
        assert_eq!(best.features, vec!["c"]);
        assert_eq!(best.raw_score, 0.1);
    }

    #[test]
    fn best_uses_penalized_score() {
        let scorer = PenaltyScorer::new(Some(0.5), ScoreDirection::HigherIsBetter);
        let mut status = SearchStatus::new(scorer);
        status.update_best(&record(&[0], 1.0), &names());
        // 1.8 - 1.5 = 0.3 < 0.5
        assert!(!status.update_best(&record(&[0, 1, 2], 1.8), &names()));
        assert_eq!(status.best.as_ref().unwrap().penalized_score, 0.5);
    }
}
