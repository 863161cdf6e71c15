//! Ordinary least squares regression

use crate::config::ParamValue;
use crate::error::{MlError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::models::{check_fit_input, check_predict_input, param_bool, unknown_param, Regressor};

/// Relative ridge added to the Gram diagonal. One-hot blocks make X^T X
/// rank deficient; the damping picks the minimum-norm solution in practice
/// without measurably moving predictions.
const GRAM_DAMPING: f64 = 1e-9;

/// Solve a symmetric positive-definite system with Cholesky.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L * z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * z[j]).sum();
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T * x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Gaussian elimination with partial pivoting (fallback when Cholesky fails).
fn gauss_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut m = a.clone();
    let mut rhs = b.clone();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| {
            m[[r1, col]].abs().total_cmp(&m[[r2, col]].abs())
        })?;
        if m[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..n {
                m.swap([col, j], [pivot_row, j]);
            }
            rhs.swap(col, pivot_row);
        }
        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                m[[row, j]] -= factor * m[[col, j]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| m[[i, j]] * x[j]).sum();
        x[i] = (rhs[i] - sum) / m[[i, i]];
    }
    Some(x)
}

/// Solve the damped normal equations (X^T X + eps*I) w = X^T y.
fn solve_least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Option<Array1<f64>> {
    let n_features = x.ncols();
    let mut xtx = x.t().dot(x);
    let xty = x.t().dot(y);

    let mean_diag = xtx.diag().iter().map(|v| v.abs()).sum::<f64>() / n_features.max(1) as f64;
    let ridge = GRAM_DAMPING * mean_diag.max(f64::MIN_POSITIVE);
    for i in 0..n_features {
        xtx[[i, i]] += ridge;
    }

    cholesky_solve(&xtx, &xty).or_else(|| gauss_solve(&xtx, &xty))
}

/// Linear regression model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (weights)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: f64,
    /// Whether to fit intercept
    pub fit_intercept: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
        }
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;

        let (coefficients, intercept) = if self.fit_intercept {
            let x_mean = x
                .mean_axis(Axis(0))
                .ok_or_else(|| MlError::InvalidInput("empty feature matrix".to_string()))?;
            let y_mean = y.mean().unwrap_or(0.0);
            let x_centered = x - &x_mean.view().insert_axis(Axis(0));
            let y_centered = y - y_mean;

            let coef = solve_least_squares(&x_centered, &y_centered).ok_or_else(|| {
                MlError::TrainingError("normal equations are singular".to_string())
            })?;
            let intercept = y_mean - coef.dot(&x_mean);
            (coef, intercept)
        } else {
            let coef = solve_least_squares(x, y).ok_or_else(|| {
                MlError::TrainingError("normal equations are singular".to_string())
            })?;
            (coef, 0.0)
        };

        self.coefficients = Some(coefficients);
        self.intercept = intercept;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(MlError::ModelNotFitted)?;
        check_predict_input(x, coefficients.len())?;
        Ok(x.dot(coefficients) + self.intercept)
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "fit_intercept" => self.fit_intercept = param_bool(name, value)?,
            _ => return Err(unknown_param("Linear Regression", name, value)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_regression_recovers_coefficients() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 4.0], [4.0, 3.0], [5.0, 5.0]];
        let y = x.column(0).mapv(|v| 2.0 * v) + x.column(1).mapv(|v| -1.0 * v) + 3.0;

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-6);
        assert!((coef[1] + 1.0).abs() < 1e-6);
        assert!((model.intercept - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_collinear_one_hot_columns() {
        // two one-hot columns that always sum to one
        let x = array![
            [1.0, 0.0, 0.5],
            [0.0, 1.0, 1.5],
            [1.0, 0.0, 2.5],
            [0.0, 1.0, 3.5],
            [1.0, 0.0, 4.5],
            [0.0, 1.0, 5.5]
        ];
        let y = array![10.0, 14.0, 12.0, 16.0, 14.0, 18.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-4, "{} vs {}", p, t);
        }
    }

    #[test]
    fn test_without_intercept() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![2.0, 4.0, 6.0];
        let mut model = LinearRegression::new().with_fit_intercept(false);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.intercept, 0.0);
        assert!((model.predict(&array![[4.0]]).unwrap()[0] - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegression::new();
        assert!(matches!(model.predict(&array![[1.0]]), Err(MlError::ModelNotFitted)));
    }

    #[test]
    fn test_set_param() {
        let mut model = LinearRegression::new();
        model.set_param("fit_intercept", &ParamValue::Bool(false)).unwrap();
        assert!(!model.fit_intercept);
        assert!(model.set_param("alpha", &ParamValue::Float(1.0)).is_err());
    }
}
