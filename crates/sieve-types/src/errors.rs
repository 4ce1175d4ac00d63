use thiserror::Error;

/// Main error type for the Sieve system
#[derive(Error, Debug)]
pub enum SieveError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(String),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl SieveError {
    /// Errors a search loop absorbs for a single candidate instead of
    /// aborting the run: model fit/predict failures and metric failures.
    pub fn is_candidate_local(&self) -> bool {
        matches!(self, Self::Model(_))
    }
}

/// Tabular data errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Column not found: {column}")]
    ColumnNotFound { column: String },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Feature universe mismatch: {message}")]
    UniverseMismatch { message: String },

    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },

    #[error("Empty dataset: {message}")]
    Empty { message: String },
}

/// Model and metric errors raised while fitting, predicting or scoring
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model not fitted")]
    NotFitted,

    #[error("Model fit failed: {message}")]
    FitFailed { message: String },

    #[error("Prediction failed: {message}")]
    PredictFailed { message: String },

    #[error("Singular system: {message}")]
    Singular { message: String },

    #[error("Invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("Metric {metric} failed: {message}")]
    MetricFailed { metric: String, message: String },
}

/// Search-loop errors
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("History schema mismatch: expected {expected} features, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("Unknown feature in history: {feature}")]
    UnknownFeature { feature: String },

    #[error("Duplicate feature set in history: {features}")]
    DuplicateFeatureSet { features: String },

    #[error("Degenerate history for surrogate training: {message}")]
    DegenerateHistory { message: String },

    #[error("Invalid feature set: {message}")]
    InvalidFeatureSet { message: String },
}

/// Result type alias for Sieve operations
pub type SieveResult<T> = Result<T, SieveError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::SieveError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::SieveError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::SieveError::Config(format!($($arg)*))
    };
}
