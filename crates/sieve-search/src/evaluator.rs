//! Real and baseline evaluation of the target model.

use ndarray::{Array1, Array2};
use tracing::debug;

use sieve_types::{
    FeatureSet, Metric, Model, ModelError, ParamMap, SieveResult, TrainValidSplit,
};

/// Fit `model` on the training matrix, predict the validation matrix and
/// score the predictions.
#[allow(clippy::too_many_arguments)]
fn fit_and_score<M: Model, S: Metric + ?Sized>(
    model: &mut M,
    model_args: &ParamMap,
    metric: &S,
    metric_args: &ParamMap,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_valid: &Array2<f64>,
    y_valid: &Array1<f64>,
) -> SieveResult<f64> {
    model.fit(x_train, y_train, model_args)?;
    let y_pred = model.predict(x_valid)?;
    if y_pred.len() != y_valid.len() {
        return Err(ModelError::PredictFailed {
            message: format!(
                "{} predictions for {} validation rows",
                y_pred.len(),
                y_valid.len()
            ),
        }
        .into());
    }
    let score = metric.score(y_valid, &y_pred, metric_args)?;
    if !score.is_finite() {
        return Err(ModelError::MetricFailed {
            metric: metric.name().to_string(),
            message: format!("non-finite score {score}"),
        }
        .into());
    }
    Ok(score)
}

/// One-shot evaluation on the full feature universe.
///
/// A pre-flight check: every failure is returned to the caller as is.
pub fn baseline_score<M: Model, S: Metric + ?Sized>(
    mut model: M,
    model_args: &ParamMap,
    data: &TrainValidSplit,
    metric: &S,
    metric_args: &ParamMap,
) -> SieveResult<f64> {
    let score = fit_and_score(
        &mut model,
        model_args,
        metric,
        metric_args,
        &data.train.features,
        &data.train.target,
        &data.valid.features,
        &data.valid.target,
    )?;
    debug!(
        "Baseline {} on {} features: {}",
        model.name(),
        data.n_features(),
        score
    );
    Ok(score)
}

/// Trains a fresh copy of the target model on one candidate subset.
#[derive(Debug, Clone)]
pub struct Evaluator<M, S> {
    prototype: M,
    model_args: ParamMap,
    metric: S,
    metric_args: ParamMap,
    data: TrainValidSplit,
}

impl<M: Model + Clone, S: Metric> Evaluator<M, S> {
    /// `prototype` should be unfitted; it is cloned for every evaluation.
    pub fn new(prototype: M, metric: S, data: TrainValidSplit) -> Self {
        Self {
            prototype,
            model_args: ParamMap::new(),
            metric,
            metric_args: ParamMap::new(),
            data,
        }
    }

    pub fn with_model_args(mut self, args: ParamMap) -> Self {
        self.model_args = args;
        self
    }

    pub fn with_metric_args(mut self, args: ParamMap) -> Self {
        self.metric_args = args;
        self
    }

    pub fn data(&self) -> &TrainValidSplit {
        &self.data
    }

    pub fn feature_names(&self) -> &[String] {
        self.data.feature_names()
    }

    pub fn n_features(&self) -> usize {
        self.data.n_features()
    }

    pub fn model_name(&self) -> &str {
        self.prototype.name()
    }

    pub fn metric_name(&self) -> &str {
        self.metric.name()
    }

    /// Raw, untransformed score of the model restricted to `set`.
    pub fn evaluate(&self, set: &FeatureSet) -> SieveResult<f64> {
        let x_train = self.data.train.select(set)?;
        let x_valid = self.data.valid.select(set)?;
        let mut model = self.prototype.clone();
        fit_and_score(
            &mut model,
            &self.model_args,
            &self.metric,
            &self.metric_args,
            &x_train,
            &self.data.train.target,
            &x_valid,
            &self.data.valid.target,
        )
    }

    /// Baseline score over the whole universe with this evaluator's setup.
    pub fn baseline(&self) -> SieveResult<f64> {
        baseline_score(
            self.prototype.clone(),
            &self.model_args,
            &self.data,
            &self.metric,
            &self.metric_args,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use sieve_forest::LinearRegression;
    use sieve_types::{Dataset, MeanSquaredError, ParameterValue, R2Score, SieveError};

    fn split() -> TrainValidSplit {
        // y = 3 * f0; f1 is unrelated
        let names = vec!["f0".to_string(), "f1".to_string()];
        let train = Dataset::new(
            names.clone(),
            array![[1.0, 5.0], [2.0, 1.0], [3.0, 4.0], [4.0, 2.0], [5.0, 3.0]],
            array![3.0, 6.0, 9.0, 12.0, 15.0],
        )
        .unwrap();
        let valid = Dataset::new(
            names,
            array![[6.0, 1.0], [7.0, 9.0], [8.0, 2.0]],
            array![18.0, 21.0, 24.0],
        )
        .unwrap();
        TrainValidSplit::new(train, valid).unwrap()
    }

    #[test]
    fn informative_subset_scores_higher() {
        let evaluator = Evaluator::new(LinearRegression::new(), R2Score, split());
        let with_f0 = evaluator.evaluate(&FeatureSet::singleton(0)).unwrap();
        let without = evaluator.evaluate(&FeatureSet::singleton(1)).unwrap();
        assert!((with_f0 - 1.0).abs() < 1e-9);
        assert!(with_f0 > without);
    }

    #[test]
    fn baseline_is_deterministic() {
        let data = split();
        let args = ParamMap::new();
        let a = baseline_score(LinearRegression::new(), &args, &data, &MeanSquaredError, &args).unwrap();
        let b = baseline_score(LinearRegression::new(), &args, &data, &MeanSquaredError, &args).unwrap();
        assert_eq!(a, b);
        assert!(a < 1e-9);
    }

    #[test]
    fn baseline_propagates_model_failure() {
        let data = split();
        let mut bad_args = ParamMap::new();
        bad_args.insert("alpha".into(), ParameterValue::Float(-3.0));
        let err = baseline_score(LinearRegression::new(), &bad_args, &data, &R2Score, &ParamMap::new())
            .unwrap_err();
        assert!(matches!(err, SieveError::Model(ModelError::InvalidArgument { .. })));
    }

    #[test]
    fn non_finite_metric_is_candidate_local() {
        let nan_metric = |_: &Array1<f64>, _: &Array1<f64>, _: &ParamMap| -> SieveResult<f64> {
            Ok(f64::NAN)
        };
        let evaluator = Evaluator::new(LinearRegression::new(), nan_metric, split());
        let err = evaluator.evaluate(&FeatureSet::singleton(0)).unwrap_err();
        assert!(err.is_candidate_local());
    }

    #[test]
    fn metric_args_are_forwarded() {
        let scaled = |t: &Array1<f64>, p: &Array1<f64>, args: &ParamMap| -> SieveResult<f64> {
            let k = sieve_types::float_arg(args, "scale")?.unwrap_or(1.0);
            Ok(k * (t - p).mapv(f64::abs).sum())
        };
        let mut args = ParamMap::new();
        args.insert("scale".into(), ParameterValue::Float(0.0));
        let evaluator = Evaluator::new(LinearRegression::new(), scaled, split()).with_metric_args(args);
        assert_eq!(evaluator.evaluate(&FeatureSet::singleton(1)).unwrap(), 0.0);
    }
}
