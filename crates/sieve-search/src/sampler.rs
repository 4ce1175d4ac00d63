//! Random feature-subset sampling under size constraints.

use rand::seq::index::sample;
use rand::Rng;

use sieve_types::{config_error, FeatureSet, SieveResult};

use crate::history::History;

/// How the subset size is chosen for one draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePolicy {
    /// Uniform in `1..=max_features`.
    Uniform,
    /// Roughly half the universe, capped by `max_features`. Used for seeding.
    Half,
}

/// Draws feature sets from a universe of `n_features` columns.
#[derive(Debug, Clone)]
pub struct FeatureSampler {
    n_features: usize,
    max_features: usize,
}

impl FeatureSampler {
    /// `max_features` above the universe size is clamped to it.
    pub fn new(n_features: usize, max_features: Option<usize>) -> SieveResult<Self> {
        if n_features == 0 {
            return Err(config_error!("feature universe is empty"));
        }
        let max_features = max_features.unwrap_or(n_features).min(n_features);
        if max_features == 0 {
            return Err(config_error!("max_features must be at least 1"));
        }
        Ok(Self {
            n_features,
            max_features,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }

    fn draw_size<R: Rng + ?Sized>(&self, rng: &mut R, policy: SizePolicy) -> usize {
        match policy {
            SizePolicy::Uniform => rng.random_range(1..=self.max_features),
            SizePolicy::Half => (self.n_features / 2).clamp(1, self.max_features),
        }
    }

    /// One random feature set.
    pub fn sample_one<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        policy: SizePolicy,
    ) -> SieveResult<FeatureSet> {
        let size = self.draw_size(rng, policy);
        FeatureSet::new(sample(rng, self.n_features, size).into_vec())
    }

    /// A batch of independent draws; duplicates are possible.
    pub fn sample_batch<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        policy: SizePolicy,
    ) -> SieveResult<Vec<FeatureSet>> {
        (0..count).map(|_| self.sample_one(rng, policy)).collect()
    }

    /// Draw until the set is absent from `history`, giving up after
    /// `max_attempts` draws and returning the last (duplicate) draw.
    pub fn sample_unseen<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        policy: SizePolicy,
        history: &History,
        max_attempts: usize,
    ) -> SieveResult<FeatureSet> {
        let mut candidate = self.sample_one(rng, policy)?;
        for _ in 1..max_attempts {
            if !history.contains(&candidate) {
                break;
            }
            candidate = self.sample_one(rng, policy)?;
        }
        Ok(candidate)
    }
}
