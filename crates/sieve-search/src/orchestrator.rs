//! The surrogate-guided search loop.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use sieve_types::{
    EvaluationRecord, FeatureSet, HistoryTable, IterationStats, Metric, Model, SearchError,
    SieveError, SieveResult,
};

use crate::config::SearchConfig;
use crate::evaluator::Evaluator;
use crate::history::History;
use crate::observer::{CandidateEvent, ObserverSet, PredictionPair, SearchObserver, StatsPoint};
use crate::penalty::PenaltyScorer;
use crate::ranker::{CandidateRanker, RankedCandidate};
use crate::sampler::{FeatureSampler, SizePolicy};
use crate::status::{BestCandidate, SearchStatus};
use crate::surrogate::{FittedSurrogate, SurrogateTrainer};

/// Drives seeding, surrogate retraining, candidate selection and real
/// evaluation for a fixed number of iterations.
///
/// ```ignore
/// let mut search = SurrogateSearch::new(config, evaluator)?;
/// let table = search.run(None)?;
/// let table = search.run(Some(&table))?; // continue where it stopped
/// ```
#[derive(Debug)]
pub struct SurrogateSearch<M, S> {
    config: SearchConfig,
    evaluator: Evaluator<M, S>,
    scorer: PenaltyScorer,
    sampler: FeatureSampler,
    observers: ObserverSet,
    status: SearchStatus,
    iteration_stats: Vec<IterationStats>,
}

impl<M: Model + Clone, S: Metric> SurrogateSearch<M, S> {
    /// Fails on invalid configuration or an empty feature universe.
    pub fn new(config: SearchConfig, evaluator: Evaluator<M, S>) -> SieveResult<Self> {
        config.validate()?;
        let n_features = evaluator.n_features();
        let sampler = FeatureSampler::new(n_features, config.max_features)?;
        if config.max_features.is_some_and(|m| m > n_features) {
            debug!(
                "max_features {:?} exceeds universe of {}, clamped",
                config.max_features, n_features
            );
        }
        let scorer = PenaltyScorer::new(config.penalty, config.direction);
        let observers = ObserverSet::new(config.verbose, config.draw_plots, config.plot_evaluation);
        Ok(Self {
            status: SearchStatus::new(scorer),
            config,
            evaluator,
            scorer,
            sampler,
            observers,
            iteration_stats: Vec::new(),
        })
    }

    /// Attach an additional observer.
    pub fn with_observer(mut self, observer: Box<dyn SearchObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &Evaluator<M, S> {
        &self.evaluator
    }

    pub fn scorer(&self) -> &PenaltyScorer {
        &self.scorer
    }

    pub fn status(&self) -> &SearchStatus {
        &self.status
    }

    /// Running best of the last run, by penalized score.
    pub fn best(&self) -> Option<&BestCandidate> {
        self.status.best.as_ref()
    }

    /// Stats of every main-loop iteration of the last run.
    pub fn iteration_stats(&self) -> &[IterationStats] {
        &self.iteration_stats
    }

    /// Progress series, kept when `draw_plots` is set.
    pub fn stats_series(&self) -> Option<&[StatsPoint]> {
        self.observers.stats().map(|r| r.points())
    }

    /// Surrogate estimate vs. real score, kept when `plot_evaluation` is set.
    pub fn prediction_pairs(&self) -> Option<&[PredictionPair]> {
        self.observers.predictions().map(|r| r.pairs())
    }

    /// Reference score of the model on the full universe. Fails fast.
    pub fn baseline(&self) -> SieveResult<f64> {
        self.evaluator.baseline()
    }

    /// Run the search, optionally continuing from a previously returned
    /// table, and return the full History as a table.
    pub fn run(&mut self, previous: Option<&HistoryTable>) -> SieveResult<HistoryTable> {
        self.status = SearchStatus::new(self.scorer);
        self.iteration_stats.clear();
        self.status.mark_running();

        match self.run_inner(previous) {
            Ok(table) => {
                self.status.mark_completed();
                let status = &self.status;
                self.observers.each(|o| o.on_search_complete(status, &table));
                Ok(table)
            }
            Err(e) => {
                self.status.mark_failed(e.to_string());
                Err(e)
            }
        }
    }

    fn run_inner(&mut self, previous: Option<&HistoryTable>) -> SieveResult<HistoryTable> {
        let feature_names = self.evaluator.feature_names().to_vec();
        let mut history = match previous {
            Some(table) => History::from_table(table, feature_names)?,
            None => History::new(feature_names),
        };
        let mut rng = match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::seed_from_u64(rand::random()),
        };

        info!(
            "Starting search {}: {} features, {} iterations x {} trials, {} prior rows",
            self.status.id,
            history.n_features(),
            self.config.num_iterations,
            self.config.num_trials_per_iteration,
            history.len()
        );

        for record in history.records() {
            self.status.update_best(record, history.feature_names());
        }

        if history.is_empty() {
            self.seed_history(&mut rng, &mut history)?;
        }

        let first = history.last_iteration().map_or(1, |i| i + 1);
        let trainer = SurrogateTrainer::new(self.config.surrogate.clone());
        let ranker = CandidateRanker::new(
            self.sampler.clone(),
            self.scorer,
            self.config.num_estimates_per_iteration,
            self.config.num_trials_per_iteration,
        );

        for iteration in first..first + self.config.num_iterations {
            let surrogate = self.train_surrogate(&trainer, &history, rng.random(), iteration)?;
            let (selected, used_fallback) =
                select_candidates(&ranker, &mut rng, &history, surrogate.as_ref(), iteration)?;
            if selected.len() < self.config.num_trials_per_iteration {
                debug!(
                    "Iteration {}: only {} unseen candidates available",
                    iteration,
                    selected.len()
                );
            }

            let mut new_scores = Vec::with_capacity(selected.len());
            for candidate in selected {
                if let Some(raw) = self.evaluate_candidate(
                    &mut history,
                    candidate.feature_set,
                    candidate.predicted,
                    iteration,
                )? {
                    new_scores.push(raw);
                }
            }

            let stats = IterationStats::from_scores(iteration, history.len(), &new_scores, used_fallback);
            if used_fallback {
                self.status.fallback_iterations += 1;
            }
            self.status.iterations_completed += 1;
            let status = &self.status;
            self.observers.each(|o| o.on_iteration_complete(&stats, status));
            self.iteration_stats.push(stats);
        }

        Ok(history.to_table())
    }

    /// Initial random batch of half-universe sets, recorded as iteration 0.
    fn seed_history(&mut self, rng: &mut ChaCha8Rng, history: &mut History) -> SieveResult<()> {
        for _ in 0..self.config.num_trials_per_iteration {
            let set = self.sampler.sample_unseen(
                rng,
                SizePolicy::Half,
                history,
                self.config.max_resample_attempts,
            )?;
            if history.contains(&set) {
                debug!("Seeding draw {} already evaluated, skipped", set);
                continue;
            }
            self.evaluate_candidate(history, set, None, 0)?;
        }
        debug!("Seeded history with {} rows", history.len());
        Ok(())
    }

    /// Fit this iteration's surrogate, or `None` to select at random.
    fn train_surrogate(
        &self,
        trainer: &SurrogateTrainer,
        history: &History,
        seed: u64,
        iteration: usize,
    ) -> SieveResult<Option<FittedSurrogate>> {
        match trainer.train(history, seed) {
            Ok(surrogate) => Ok(Some(surrogate)),
            Err(e @ SieveError::Search(SearchError::DegenerateHistory { .. })) => {
                debug!("Iteration {}: {}; selecting at random", iteration, e);
                Ok(None)
            }
            Err(e) if e.is_candidate_local() => {
                warn!("Iteration {}: surrogate fit failed: {}; selecting at random", iteration, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Evaluate one set and append it to History. Candidate-local failures
    /// are reported to observers and yield `Ok(None)`.
    fn evaluate_candidate(
        &mut self,
        history: &mut History,
        set: FeatureSet,
        predicted: Option<f64>,
        iteration: usize,
    ) -> SieveResult<Option<f64>> {
        let raw = match self.evaluator.evaluate(&set) {
            Ok(raw) => raw,
            Err(e) if e.is_candidate_local() => {
                self.status.candidates_failed += 1;
                self.observers.each(|o| o.on_candidate_failed(iteration, &set, &e));
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let penalized = self.scorer.record_score(raw, set.len());
        let record = EvaluationRecord::new(set, raw, penalized, iteration);
        history.insert(record.clone())?;
        self.status.candidates_evaluated += 1;

        let feature_names = history.feature_names();
        self.status.update_best(&record, feature_names);
        let event = CandidateEvent {
            iteration,
            feature_set: &record.feature_set,
            features: record.feature_set.names(feature_names),
            raw_score: raw,
            penalized_score: penalized,
            predicted,
        };
        self.observers.each(|o| o.on_candidate_evaluated(&event));
        Ok(Some(raw))
    }
}

/// Rank this iteration's candidates. The flag is true when they were
/// chosen without surrogate estimates, either because no surrogate was fitted
/// or because its predictions failed.
fn select_candidates<R: Rng + ?Sized>(
    ranker: &CandidateRanker,
    rng: &mut R,
    history: &History,
    surrogate: Option<&FittedSurrogate>,
    iteration: usize,
) -> SieveResult<(Vec<RankedCandidate>, bool)> {
    let Some(surrogate) = surrogate else {
        return Ok((ranker.select(rng, history, None)?, true));
    };
    match ranker.select(rng, history, Some(surrogate)) {
        Ok(selected) => Ok((selected, false)),
        Err(e) if e.is_candidate_local() => {
            warn!("Iteration {}: surrogate predict failed: {}; selecting at random", iteration, e);
            Ok((ranker.select(rng, history, None)?, true))
        }
        Err(e) => Err(e),
    }
}
