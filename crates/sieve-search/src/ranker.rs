//! Surrogate-guided candidate selection for one iteration.

use std::collections::HashSet;

use rand::Rng;

use sieve_types::{FeatureSet, SieveResult};

use crate::history::History;
use crate::penalty::PenaltyScorer;
use crate::sampler::{FeatureSampler, SizePolicy};
use crate::surrogate::FittedSurrogate;

/// A sampled candidate with its surrogate estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub feature_set: FeatureSet,
    /// Predicted raw score; `None` when no surrogate was available.
    pub predicted: Option<f64>,
    /// Direction-free key of the penalized prediction. Larger is better.
    pub key: f64,
}

/// Samples a large random batch and keeps the most promising unseen sets.
#[derive(Debug, Clone)]
pub struct CandidateRanker {
    sampler: FeatureSampler,
    scorer: PenaltyScorer,
    num_estimates: usize,
    num_trials: usize,
}

impl CandidateRanker {
    pub fn new(
        sampler: FeatureSampler,
        scorer: PenaltyScorer,
        num_estimates: usize,
        num_trials: usize,
    ) -> Self {
        Self {
            sampler,
            scorer,
            num_estimates,
            num_trials,
        }
    }

    /// Draw `num_estimates` sets, drop in-batch duplicates and sets already in
    /// `history`, then return up to `num_trials` of them.
    ///
    /// With a surrogate the survivors are ordered by predicted penalized
    /// score; without one they keep sampling order.
    pub fn select<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        history: &History,
        surrogate: Option<&FittedSurrogate>,
    ) -> SieveResult<Vec<RankedCandidate>> {
        let mut batch_seen = HashSet::new();
        let candidates: Vec<FeatureSet> = self
            .sampler
            .sample_batch(rng, self.num_estimates, SizePolicy::Uniform)?
            .into_iter()
            .filter(|set| !history.contains(set) && batch_seen.insert(set.clone()))
            .collect();

        let mut ranked = match surrogate {
            Some(surrogate) => {
                let predictions = surrogate.predict(&candidates)?;
                let mut ranked: Vec<RankedCandidate> = candidates
                    .into_iter()
                    .zip(predictions)
                    .map(|(feature_set, predicted)| {
                        let key = self.scorer.key_for(predicted, feature_set.len());
                        RankedCandidate {
                            feature_set,
                            predicted: Some(predicted),
                            key,
                        }
                    })
                    .collect();
                // stable: equal keys keep sampling order
                ranked.sort_by(|a, b| b.key.total_cmp(&a.key));
                ranked
            }
            None => candidates
                .into_iter()
                .map(|feature_set| RankedCandidate {
                    feature_set,
                    predicted: None,
                    key: f64::NEG_INFINITY,
                })
                .collect(),
        };

        ranked.truncate(self.num_trials);
        Ok(ranked)
    }
}
