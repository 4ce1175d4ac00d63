//! Capability traits consumed by the evaluators.
//!
//! The search never cares what family a model belongs to; anything that can
//! be fitted on a feature matrix and then predict is acceptable.

use ndarray::{Array1, Array2};

use crate::errors::SieveResult;
use crate::params::ParamMap;

/// A trainable, predicting model.
///
/// Evaluators clone an unfitted prototype for every candidate, so
/// implementations should make `Clone` cheap before `fit` is called.
pub trait Model {
    /// Fit on `x` (rows x selected features) and `y`.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, args: &ParamMap) -> SieveResult<()>;

    /// Predict one value per row of `x`.
    fn predict(&self, x: &Array2<f64>) -> SieveResult<Array1<f64>>;

    /// Human-readable model name.
    fn name(&self) -> &str;
}

/// A scoring function `(y_true, y_pred, args) -> scalar`.
///
/// The sign convention is owned by the search's score direction, not by
/// the metric.
pub trait Metric {
    fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>, args: &ParamMap)
        -> SieveResult<f64>;

    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> Metric for F
where
    F: Fn(&Array1<f64>, &Array1<f64>, &ParamMap) -> SieveResult<f64>,
{
    fn score(
        &self,
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        args: &ParamMap,
    ) -> SieveResult<f64> {
        self(y_true, y_pred, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn closures_are_metrics() {
        let bias = |t: &Array1<f64>, p: &Array1<f64>, _: &ParamMap| -> SieveResult<f64> {
            Ok((p - t).sum())
        };
        let score = bias
            .score(&array![1.0, 2.0], &array![2.0, 4.0], &ParamMap::new())
            .unwrap();
        assert_eq!(score, 3.0);
        assert_eq!(Metric::name(&bias), "custom");
    }
}
