//! Feature-count penalty applied on top of raw scores.

use serde::{Deserialize, Serialize};

use sieve_types::ScoreDirection;

/// Turns a raw score into a penalized score and a direction-free ranking key.
///
/// The penalty always makes a larger subset look worse: it is subtracted
/// when higher scores win and added when lower scores win.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyScorer {
    pub penalty: Option<f64>,
    pub direction: ScoreDirection,
}

impl PenaltyScorer {
    pub fn new(penalty: Option<f64>, direction: ScoreDirection) -> Self {
        Self { penalty, direction }
    }

    pub fn is_penalized(&self) -> bool {
        self.penalty.is_some()
    }

    pub fn penalized_score(&self, raw_score: f64, num_features: usize) -> f64 {
        let Some(penalty) = self.penalty else {
            return raw_score;
        };
        let cost = penalty * num_features as f64;
        match self.direction {
            ScoreDirection::HigherIsBetter => raw_score - cost,
            ScoreDirection::LowerIsBetter => raw_score + cost,
        }
    }

    /// The value stored on a record: `None` when no penalty is configured.
    pub fn record_score(&self, raw_score: f64, num_features: usize) -> Option<f64> {
        self.penalty
            .map(|_| self.penalized_score(raw_score, num_features))
    }

    /// Larger is better regardless of direction. NaN sorts last.
    pub fn comparable_key(&self, penalized_score: f64) -> f64 {
        let key = self.direction.comparable_key(penalized_score);
        if key.is_nan() {
            f64::NEG_INFINITY
        } else {
            key
        }
    }

    /// Ranking key straight from a raw score.
    pub fn key_for(&self, raw_score: f64, num_features: usize) -> f64 {
        self.comparable_key(self.penalized_score(raw_score, num_features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_penalty_is_identity() {
        let scorer = PenaltyScorer::new(None, ScoreDirection::HigherIsBetter);
        assert_eq!(scorer.penalized_score(0.75, 10), 0.75);
        assert_eq!(scorer.record_score(0.75, 10), None);
    }

    #[test]
    fn higher_is_better_subtracts() {
        let scorer = PenaltyScorer::new(Some(0.1), ScoreDirection::HigherIsBetter);
        assert!((scorer.penalized_score(3.0, 3) - 2.7).abs() < 1e-12);
        assert_eq!(scorer.record_score(3.0, 3).map(|s| (s * 10.0).round()), Some(27.0));
    }

    #[test]
    fn lower_is_better_adds() {
        let scorer = PenaltyScorer::new(Some(0.5), ScoreDirection::LowerIsBetter);
        assert_eq!(scorer.penalized_score(1.0, 2), 2.0);
        assert_eq!(scorer.comparable_key(2.0), -2.0);
    }

    #[test]
    fn penalty_is_monotone_in_subset_size() {
        for direction in [ScoreDirection::HigherIsBetter, ScoreDirection::LowerIsBetter] {
            let scorer = PenaltyScorer::new(Some(0.05), direction);
            let keys: Vec<f64> = (1..=20).map(|n| scorer.key_for(0.8, n)).collect();
            assert!(keys.windows(2).all(|w| w[0] >= w[1]), "{direction:?}");

            let scores: Vec<f64> = (1..=20).map(|n| scorer.penalized_score(0.8, n)).collect();
            let monotone = match direction {
                ScoreDirection::HigherIsBetter => scores.windows(2).all(|w| w[0] >= w[1]),
                ScoreDirection::LowerIsBetter => scores.windows(2).all(|w| w[0] <= w[1]),
            };
            assert!(monotone);
        }
    }

    #[test]
    fn nan_ranks_last() {
        let scorer = PenaltyScorer::new(None, ScoreDirection::HigherIsBetter);
        assert_eq!(scorer.comparable_key(f64::NAN), f64::NEG_INFINITY);
    }
}
