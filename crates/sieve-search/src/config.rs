//! Search configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use sieve_types::{config_error, ScoreDirection, SieveResult};

/// Settings for the random-forest surrogate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurrogateConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_leaf: 1,
        }
    }
}

/// Top-level configuration for one search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of surrogate-guided iterations after seeding.
    pub num_iterations: usize,

    /// Random candidates scored by the surrogate per iteration.
    pub num_estimates_per_iteration: usize,

    /// Real evaluations per iteration (also the seeding batch size).
    pub num_trials_per_iteration: usize,

    /// Upper bound on subset size; the universe size when unset.
    pub max_features: Option<usize>,

    /// Per-feature score cost.
    pub penalty: Option<f64>,

    /// Orientation of the metric.
    pub direction: ScoreDirection,

    /// Seed for sampling and surrogate fitting; entropy when unset.
    pub seed: Option<u64>,

    /// Redraws allowed when a sampled set already exists in History.
    pub max_resample_attempts: usize,

    pub surrogate: SurrogateConfig,

    /// Per-candidate events are logged at `info` instead of `debug`.
    pub verbose: bool,

    /// Keep the per-iteration stats series for plotting.
    pub draw_plots: bool,

    /// Keep (predicted, actual) pairs for every surrogate-selected candidate.
    pub plot_evaluation: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_iterations: 10,
            num_estimates_per_iteration: 1000,
            num_trials_per_iteration: 5,
            max_features: None,
            penalty: None,
            direction: ScoreDirection::HigherIsBetter,
            seed: None,
            max_resample_attempts: 20,
            surrogate: SurrogateConfig::default(),
            verbose: false,
            draw_plots: false,
            plot_evaluation: false,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> SieveResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SieveResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn with_iterations(mut self, n: usize) -> Self {
        self.num_iterations = n;
        self
    }

    pub fn with_estimates_per_iteration(mut self, n: usize) -> Self {
        self.num_estimates_per_iteration = n;
        self
    }

    pub fn with_trials_per_iteration(mut self, n: usize) -> Self {
        self.num_trials_per_iteration = n;
        self
    }

    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n);
        self
    }

    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = Some(penalty);
        self
    }

    pub fn with_higher_is_better(mut self, higher_is_better: bool) -> Self {
        self.direction = ScoreDirection::from_higher_is_better(higher_is_better);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_surrogate(mut self, surrogate: SurrogateConfig) -> Self {
        self.surrogate = surrogate;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_plots(mut self, draw_plots: bool, plot_evaluation: bool) -> Self {
        self.draw_plots = draw_plots;
        self.plot_evaluation = plot_evaluation;
        self
    }

    pub fn higher_is_better(&self) -> bool {
        self.direction.higher_is_better()
    }

    /// Subset size bound for a universe of `n_features`.
    pub fn effective_max_features(&self, n_features: usize) -> usize {
        self.max_features.map_or(n_features, |m| m.min(n_features))
    }

    /// Reject configurations that would make the whole run meaningless.
    pub fn validate(&self) -> SieveResult<()> {
        if self.num_iterations == 0 {
            return Err(config_error!("num_iterations must be positive"));
        }
        if self.num_estimates_per_iteration == 0 {
            return Err(config_error!("num_estimates_per_iteration must be positive"));
        }
        if self.num_trials_per_iteration == 0 {
            return Err(config_error!("num_trials_per_iteration must be positive"));
        }
        if self.max_features == Some(0) {
            return Err(config_error!("max_features must be at least 1"));
        }
        if let Some(penalty) = self.penalty {
            if !penalty.is_finite() || penalty < 0.0 {
                return Err(config_error!(
                    "penalty must be finite and non-negative, got {penalty}"
                ));
            }
        }
        if self.max_resample_attempts == 0 {
            return Err(config_error!("max_resample_attempts must be positive"));
        }
        if self.surrogate.n_estimators == 0 {
            return Err(config_error!("surrogate.n_estimators must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SearchConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.higher_is_better());
        assert_eq!(config.effective_max_features(7), 7);
    }

    #[test]
    fn builder_chain() {
        let config = SearchConfig::new()
            .with_iterations(2)
            .with_trials_per_iteration(4)
            .with_max_features(3)
            .with_penalty(0.1)
            .with_higher_is_better(false)
            .with_seed(9);
        assert_eq!(config.num_iterations, 2);
        assert_eq!(config.num_trials_per_iteration, 4);
        assert_eq!(config.effective_max_features(5), 3);
        assert_eq!(config.effective_max_features(2), 2);
        assert_eq!(config.direction, ScoreDirection::LowerIsBetter);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn non_positive_counts_rejected() {
        assert!(SearchConfig::new().with_iterations(0).validate().is_err());
        assert!(SearchConfig::new().with_trials_per_iteration(0).validate().is_err());
        assert!(SearchConfig::new().with_estimates_per_iteration(0).validate().is_err());
        assert!(SearchConfig::new().with_max_features(0).validate().is_err());
        assert!(SearchConfig::new().with_penalty(-0.1).validate().is_err());
        assert!(SearchConfig::new().with_penalty(f64::NAN).validate().is_err());
    }

    #[test]
    fn json_with_partial_fields() {
        let json = r#"{
            "num_iterations": 3,
            "penalty": 0.01,
            "direction": "lower_is_better",
            "surrogate": { "n_estimators": 25 }
        }"#;
        let config = SearchConfig::from_json_str(json).unwrap();
        assert_eq!(config.num_iterations, 3);
        assert_eq!(config.penalty, Some(0.01));
        assert!(!config.higher_is_better());
        assert_eq!(config.surrogate.n_estimators, 25);
        assert_eq!(config.surrogate.min_samples_leaf, 1);
        assert_eq!(config.num_trials_per_iteration, 5);
    }

    #[test]
    fn json_file_round_trip() {
        let config = SearchConfig::new().with_seed(3).with_max_features(4);
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(SearchConfig::from_json_file(file.path()).unwrap(), config);
    }
}
