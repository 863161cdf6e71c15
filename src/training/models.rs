//! Regressor capability and scoring

use crate::config::ParamValue;
use crate::error::{MlError, Result};
use ndarray::{Array1, Array2};

/// Capability shared by every candidate regression algorithm
pub trait Regressor: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;

    /// Apply one hyperparameter by its configuration name
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;
}

/// Coefficient of determination.
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(MlError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(MlError::InvalidInput("cannot score an empty target".to_string()));
    }

    let n = y_true.len() as f64;
    let y_mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot > 0.0 {
        Ok(1.0 - ss_res / ss_tot)
    } else if ss_res == 0.0 {
        Ok(1.0)
    } else {
        Ok(0.0)
    }
}

/// Validate a training pair before fitting.
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(MlError::ShapeError {
            expected: format!("{} targets", x.nrows()),
            actual: format!("{} targets", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(MlError::InvalidInput("cannot fit on zero samples".to_string()));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(MlError::InvalidInput(
            "input contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Validate prediction input width against the fitted width.
pub(crate) fn check_predict_input(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(MlError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

pub(crate) fn param_usize(name: &str, value: &ParamValue) -> Result<usize> {
    value
        .as_usize()
        .ok_or_else(|| MlError::invalid_param(name, value, "expected a non-negative integer"))
}

pub(crate) fn param_positive_usize(name: &str, value: &ParamValue) -> Result<usize> {
    match param_usize(name, value)? {
        0 => Err(MlError::invalid_param(name, value, "must be at least 1")),
        v => Ok(v),
    }
}

/// `None` in the grid maps to an unbounded setting.
pub(crate) fn param_optional_usize(name: &str, value: &ParamValue) -> Result<Option<usize>> {
    if value.is_null() {
        Ok(None)
    } else {
        param_positive_usize(name, value).map(Some)
    }
}

pub(crate) fn param_f64(name: &str, value: &ParamValue) -> Result<f64> {
    value
        .as_float()
        .filter(|v| v.is_finite())
        .ok_or_else(|| MlError::invalid_param(name, value, "expected a number"))
}

pub(crate) fn param_fraction(name: &str, value: &ParamValue) -> Result<f64> {
    let v = param_f64(name, value)?;
    if v > 0.0 && v <= 1.0 {
        Ok(v)
    } else {
        Err(MlError::invalid_param(name, value, "must be in (0, 1]"))
    }
}

pub(crate) fn param_bool(name: &str, value: &ParamValue) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| MlError::invalid_param(name, value, "expected a boolean"))
}

pub(crate) fn param_str<'a>(name: &str, value: &'a ParamValue) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| MlError::invalid_param(name, value, "expected a string"))
}

pub(crate) fn unknown_param(model: &str, name: &str, value: &ParamValue) -> MlError {
    MlError::invalid_param(name, value, &format!("unknown parameter for {}", model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_r2_perfect_and_mean() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert!((r2_score(&y, &y).unwrap() - 1.0).abs() < 1e-12);

        let mean = Array1::from_elem(4, 2.5);
        assert!(r2_score(&y, &mean).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_r2_can_be_negative() {
        let y = array![1.0, 2.0, 3.0];
        let bad = array![3.0, 2.0, 1.0];
        assert!((r2_score(&y, &bad).unwrap() + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![5.0, 5.0, 5.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![5.0, 5.0, 4.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_r2_length_mismatch() {
        let result = r2_score(&array![1.0, 2.0], &array![1.0]);
        assert!(matches!(result, Err(MlError::ShapeError { .. })));
    }

    #[test]
    fn test_check_fit_input_rejects_nan() {
        let x = array![[1.0], [f64::NAN]];
        let y = array![1.0, 2.0];
        assert!(check_fit_input(&x, &y).is_err());
    }
}
