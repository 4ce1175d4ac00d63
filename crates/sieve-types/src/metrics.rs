//! Built-in evaluation metrics.

use ndarray::Array1;

use crate::errors::{ModelError, SieveResult};
use crate::model::Metric;
use crate::params::{float_arg, ParamMap};

fn check_lengths(metric: &str, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> SieveResult<()> {
    if y_true.len() != y_pred.len() {
        return Err(ModelError::MetricFailed {
            metric: metric.to_string(),
            message: format!("{} labels vs {} predictions", y_true.len(), y_pred.len()),
        }
        .into());
    }
    if y_true.is_empty() {
        return Err(ModelError::MetricFailed {
            metric: metric.to_string(),
            message: "no samples".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Coefficient of determination. Higher is better.
#[derive(Debug, Clone, Copy, Default)]
pub struct R2Score;

impl Metric for R2Score {
    fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>, _args: &ParamMap) -> SieveResult<f64> {
        check_lengths("r2", y_true, y_pred)?;
        let mean = y_true.mean().unwrap_or(0.0);
        let ss_tot: f64 = y_true.iter().map(|y| (y - mean).powi(2)).sum();
        let ss_res: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).powi(2))
            .sum();
        if ss_tot == 0.0 {
            // Constant target: perfect predictions score 1, anything else 0.
            return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
        }
        Ok(1.0 - ss_res / ss_tot)
    }

    fn name(&self) -> &str {
        "r2"
    }
}

/// Mean squared error. Lower is better.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

impl Metric for MeanSquaredError {
    fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>, _args: &ParamMap) -> SieveResult<f64> {
        check_lengths("mse", y_true, y_pred)?;
        let sum: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).powi(2))
            .sum();
        Ok(sum / y_true.len() as f64)
    }

    fn name(&self) -> &str {
        "mse"
    }
}

/// Mean absolute error. Lower is better.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAbsoluteError;

impl Metric for MeanAbsoluteError {
    fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>, _args: &ParamMap) -> SieveResult<f64> {
        check_lengths("mae", y_true, y_pred)?;
        let sum: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).abs())
            .sum();
        Ok(sum / y_true.len() as f64)
    }

    fn name(&self) -> &str {
        "mae"
    }
}

/// Binary accuracy. Predictions are thresholded with the `threshold`
/// argument (default 0.5); labels are compared as `> 0.5`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl Metric for Accuracy {
    fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>, args: &ParamMap) -> SieveResult<f64> {
        check_lengths("accuracy", y_true, y_pred)?;
        let threshold = float_arg(args, "threshold")?.unwrap_or(0.5);
        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| (**t > 0.5) == (**p > threshold))
            .count();
        Ok(correct as f64 / y_true.len() as f64)
    }

    fn name(&self) -> &str {
        "accuracy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterValue;
    use ndarray::array;

    #[test]
    fn r2_perfect_and_mean() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        let args = ParamMap::new();
        assert!((R2Score.score(&y, &y, &args).unwrap() - 1.0).abs() < 1e-12);

        let mean_pred = array![2.5, 2.5, 2.5, 2.5];
        assert!(R2Score.score(&y, &mean_pred, &args).unwrap().abs() < 1e-12);
    }

    #[test]
    fn errors_on_length_mismatch() {
        let args = ParamMap::new();
        assert!(MeanSquaredError
            .score(&array![1.0, 2.0], &array![1.0], &args)
            .is_err());
        assert!(MeanAbsoluteError
            .score(&Array1::zeros(0), &Array1::zeros(0), &args)
            .is_err());
    }

    #[test]
    fn mse_and_mae() {
        let args = ParamMap::new();
        let t = array![0.0, 0.0];
        let p = array![1.0, -3.0];
        assert_eq!(MeanSquaredError.score(&t, &p, &args).unwrap(), 5.0);
        assert_eq!(MeanAbsoluteError.score(&t, &p, &args).unwrap(), 2.0);
    }

    #[test]
    fn accuracy_threshold_argument() {
        let t = array![1.0, 0.0, 1.0, 0.0];
        let p = array![0.7, 0.4, 0.6, 0.1];
        assert_eq!(Accuracy.score(&t, &p, &ParamMap::new()).unwrap(), 1.0);

        let mut args = ParamMap::new();
        args.insert("threshold".into(), ParameterValue::Float(0.65));
        assert_eq!(Accuracy.score(&t, &p, &args).unwrap(), 0.75);
    }
}
