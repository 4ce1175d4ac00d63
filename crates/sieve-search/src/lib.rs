//! # sieve-search
//!
//! Surrogate-guided search for a feature subset that optimises a model's
//! validation score. Each iteration retrains a random-forest surrogate on
//! every evaluated subset, scores a large random batch of candidates with
//! it, and spends real model fits only on the most promising unseen ones.

pub mod config;
pub mod evaluator;
pub mod history;
pub mod observer;
pub mod orchestrator;
pub mod penalty;
pub mod ranker;
pub mod sampler;
pub mod status;
pub mod surrogate;

pub use config::{SearchConfig, SurrogateConfig};
pub use evaluator::{baseline_score, Evaluator};
pub use history::History;
pub use observer::{
    CandidateEvent, ObserverSet, PredictionPair, PredictionRecorder, SearchObserver, StatsPoint,
    StatsRecorder, TracingObserver,
};
pub use orchestrator::SurrogateSearch;
pub use penalty::PenaltyScorer;
pub use ranker::{CandidateRanker, RankedCandidate};
pub use sampler::{FeatureSampler, SizePolicy};
pub use status::{BestCandidate, SearchId, SearchState, SearchStatus};
pub use surrogate::{encode_sets, FittedSurrogate, SurrogateTrainer};
