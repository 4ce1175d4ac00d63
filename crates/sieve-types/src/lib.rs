//! # sieve-types
//!
//! Core data model for Sieve, a surrogate-guided feature subset search:
//! feature sets, evaluation records, tabular datasets, the `Model` and
//! `Metric` capabilities, built-in metrics and the error taxonomy.

pub mod dataset;
pub mod errors;
pub mod feature_set;
pub mod metrics;
pub mod model;
pub mod params;
pub mod record;
pub mod table;

pub use dataset::*;
pub use errors::*;
pub use feature_set::*;
pub use metrics::{Accuracy, MeanAbsoluteError, MeanSquaredError, R2Score};
pub use model::{Metric, Model};
pub use params::{float_arg, usize_arg, ParamMap, ParameterValue};
pub use record::*;
pub use table::{HistoryRow, HistoryTable, RESERVED_COLUMNS};
