//! Hooks invoked by the search loop at well-defined points.
//!
//! The core never prints or plots; anything that wants to report progress
//! implements [`SearchObserver`] and is attached to the search.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sieve_types::{FeatureSet, HistoryTable, IterationStats, SieveError};

use crate::status::SearchStatus;

/// A candidate that was evaluated and appended to History.
#[derive(Debug, Clone)]
pub struct CandidateEvent<'a> {
    pub iteration: usize,
    pub feature_set: &'a FeatureSet,
    pub features: Vec<&'a str>,
    pub raw_score: f64,
    pub penalized_score: Option<f64>,
    /// Surrogate estimate for the candidate, when one was made.
    pub predicted: Option<f64>,
}

/// Search progress callbacks. Every hook defaults to a no-op.
pub trait SearchObserver {
    fn on_candidate_evaluated(&mut self, _event: &CandidateEvent<'_>) {}

    fn on_candidate_failed(&mut self, _iteration: usize, _feature_set: &FeatureSet, _error: &SieveError) {}

    fn on_iteration_complete(&mut self, _stats: &IterationStats, _status: &SearchStatus) {}

    fn on_search_complete(&mut self, _status: &SearchStatus, _table: &HistoryTable) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    verbose: bool,
}

impl TracingObserver {
    /// With `verbose`, per-candidate events are logged at `info`.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl SearchObserver for TracingObserver {
    fn on_candidate_evaluated(&mut self, event: &CandidateEvent<'_>) {
        if self.verbose {
            info!(
                "[iter {}] {:?}: raw={:.6} penalized={:?} predicted={:?}",
                event.iteration, event.features, event.raw_score, event.penalized_score, event.predicted
            );
        } else {
            debug!(
                "[iter {}] {:?}: raw={:.6} penalized={:?} predicted={:?}",
                event.iteration, event.features, event.raw_score, event.penalized_score, event.predicted
            );
        }
    }

    fn on_candidate_failed(&mut self, iteration: usize, feature_set: &FeatureSet, error: &SieveError) {
        warn!("[iter {}] candidate {} discarded: {}", iteration, feature_set, error);
    }

    fn on_iteration_complete(&mut self, stats: &IterationStats, status: &SearchStatus) {
        info!(
            "Iteration {}: {} new, {} total, mean={:?} max={:?}{}",
            stats.iteration,
            stats.new_evaluated,
            stats.cumulative_evaluated,
            stats.mean_new_score,
            stats.max_new_score,
            if stats.used_fallback { " (random fallback)" } else { "" }
        );
        if let Some(best) = &status.best {
            debug!("Best so far: {:?} penalized={:.6}", best.features, best.penalized_score);
        }
    }

    fn on_search_complete(&mut self, status: &SearchStatus, table: &HistoryTable) {
        info!(
            "Search {} finished: {} rows, {} failed candidates, {} fallback iterations",
            status.id,
            table.len(),
            status.candidates_failed,
            status.fallback_iterations
        );
    }
}

/// One point of the per-iteration progress series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsPoint {
    pub stats: IterationStats,
    /// Best penalized score seen up to and including this iteration.
    pub best_penalized_score: Option<f64>,
}

/// Keeps the iteration series a plotting front-end needs.
#[derive(Debug, Clone, Default)]
pub struct StatsRecorder {
    points: Vec<StatsPoint>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[StatsPoint] {
        &self.points
    }
}

impl SearchObserver for StatsRecorder {
    fn on_iteration_complete(&mut self, stats: &IterationStats, status: &SearchStatus) {
        self.points.push(StatsPoint {
            stats: stats.clone(),
            best_penalized_score: status.best.as_ref().map(|b| b.penalized_score),
        });
    }
}

/// A surrogate estimate paired with the real score that followed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPair {
    pub iteration: usize,
    pub feature_set: FeatureSet,
    pub predicted: f64,
    pub actual: f64,
}

/// Collects (predicted, actual) pairs for surrogate-selected candidates.
#[derive(Debug, Clone, Default)]
pub struct PredictionRecorder {
    pairs: Vec<PredictionPair>,
}

impl PredictionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairs(&self) -> &[PredictionPair] {
        &self.pairs
    }
}

impl SearchObserver for PredictionRecorder {
    fn on_candidate_evaluated(&mut self, event: &CandidateEvent<'_>) {
        if let Some(predicted) = event.predicted {
            self.pairs.push(PredictionPair {
                iteration: event.iteration,
                feature_set: event.feature_set.clone(),
                predicted,
                actual: event.raw_score,
            });
        }
    }
}

/// The observers attached to one search: the built-in ones switched on by
/// configuration plus any caller-supplied hooks.
#[derive(Default)]
pub struct ObserverSet {
    tracing: TracingObserver,
    stats: Option<StatsRecorder>,
    predictions: Option<PredictionRecorder>,
    custom: Vec<Box<dyn SearchObserver>>,
}

impl ObserverSet {
    pub fn new(verbose: bool, draw_plots: bool, plot_evaluation: bool) -> Self {
        Self {
            tracing: TracingObserver::new(verbose),
            stats: draw_plots.then(StatsRecorder::new),
            predictions: plot_evaluation.then(PredictionRecorder::new),
            custom: Vec::new(),
        }
    }

    pub fn push(&mut self, observer: Box<dyn SearchObserver>) {
        self.custom.push(observer);
    }

    pub fn stats(&self) -> Option<&StatsRecorder> {
        self.stats.as_ref()
    }

    pub fn predictions(&self) -> Option<&PredictionRecorder> {
        self.predictions.as_ref()
    }

    /// Call `f` on every observer, built-ins first.
    pub fn each<F: FnMut(&mut dyn SearchObserver)>(&mut self, mut f: F) {
        f(&mut self.tracing);
        if let Some(stats) = self.stats.as_mut() {
            f(stats);
        }
        if let Some(predictions) = self.predictions.as_mut() {
            f(predictions);
        }
        for observer in &mut self.custom {
            f(observer.as_mut());
        }
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("tracing", &self.tracing)
            .field("stats", &self.stats.is_some())
            .field("predictions", &self.predictions.is_some())
            .field("custom", &self.custom.len())
            .finish()
    }
}
