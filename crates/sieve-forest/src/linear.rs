//! Ordinary least squares / ridge regression via the normal equations.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use sieve_types::{float_arg, Model, ModelError, ParamMap, SieveResult};

const PIVOT_EPS: f64 = 1e-10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    /// L2 penalty; 0 gives plain least squares.
    pub alpha: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

/// Solve `a * w = b` in place with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> SieveResult<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot_row, col]].abs() < PIVOT_EPS {
            return Err(ModelError::Singular {
                message: format!("normal equations are rank deficient at column {col}"),
            }
            .into());
        }
        if pivot_row != col {
            for k in 0..n {
                a.swap([col, k], [pivot_row, k]);
            }
            b.swap(col, pivot_row);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut w = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * w[k]).sum();
        w[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(w)
}

impl Model for LinearRegression {
    /// Recognised argument: `alpha` (overrides the field for this fit).
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, args: &ParamMap) -> SieveResult<()> {
        if x.nrows() != y.len() || x.nrows() == 0 {
            return Err(ModelError::FitFailed {
                message: format!("x has {} rows, y has {}", x.nrows(), y.len()),
            }
            .into());
        }
        let alpha = float_arg(args, "alpha")?.unwrap_or(self.alpha);
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(ModelError::InvalidArgument {
                name: "alpha".to_string(),
                message: format!("must be finite and non-negative, got {alpha}"),
            }
            .into());
        }

        // Centre so the intercept drops out of the system.
        let x_mean = x.mean_axis(Axis(0)).ok_or(ModelError::FitFailed {
            message: "empty feature matrix".to_string(),
        })?;
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let mut gram = xc.t().dot(&xc);
        for i in 0..gram.nrows() {
            gram[[i, i]] += alpha;
        }
        let rhs = xc.t().dot(&yc);

        let w = solve(gram, rhs)?;
        self.intercept = y_mean - x_mean.dot(&w);
        self.coefficients = Some(w);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> SieveResult<Array1<f64>> {
        let w = self.coefficients.as_ref().ok_or(ModelError::NotFitted)?;
        if x.ncols() != w.len() {
            return Err(ModelError::PredictFailed {
                message: format!("fitted on {} features, got {}", w.len(), x.ncols()),
            }
            .into());
        }
        Ok(x.dot(w) + self.intercept)
    }

    fn name(&self) -> &str {
        "linear_regression"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use sieve_types::ParameterValue;

    #[test]
    fn recovers_linear_relationship() {
        // y = 2a - b + 1
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 5.0], [4.0, 2.0], [0.0, 3.0]];
        let y = array![3.0, 4.0, 2.0, 7.0, -2.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y, &ParamMap::new()).unwrap();

        let w = model.coefficients().unwrap();
        assert!((w[0] - 2.0).abs() < 1e-9);
        assert!((w[1] + 1.0).abs() < 1e-9);
        assert!((model.intercept() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn duplicate_columns_are_singular() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let y = array![1.0, 2.0, 3.0];

        let mut model = LinearRegression::new();
        let err = model.fit(&x, &y, &ParamMap::new()).unwrap_err();
        assert!(err.is_candidate_local());
    }

    #[test]
    fn ridge_alpha_resolves_singularity() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut args = ParamMap::new();
        args.insert("alpha".into(), ParameterValue::Float(0.1));

        let mut model = LinearRegression::new();
        model.fit(&x, &y, &args).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!((pred[2] - 3.0).abs() < 0.2);
    }

    #[test]
    fn negative_alpha_rejected() {
        let mut model = LinearRegression::new().with_alpha(-1.0);
        assert!(model
            .fit(&array![[1.0], [2.0]], &array![1.0, 2.0], &ParamMap::new())
            .is_err());
    }
}
