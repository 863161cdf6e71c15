//! AdaBoost regression (AdaBoost.R2)
//!
//! Each round resamples the training rows according to the current sample
//! weights, fits a shallow regression tree, and down-weights the rows that
//! tree already predicts well. Predictions are the weighted median of the
//! per-round predictions.

use crate::config::ParamValue;
use crate::error::{MlError, Result};
use ndarray::{Array1, Array2};
use rand::distributions::{Distribution, WeightedIndex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decision_tree::DecisionTreeRegressor;
use super::models::{
    check_fit_input, check_predict_input, param_f64, param_positive_usize, param_str, param_usize,
    unknown_param, Regressor,
};

/// How a round's absolute errors are turned into per-sample losses in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BoostLoss {
    #[default]
    Linear,
    Square,
    Exponential,
}

impl BoostLoss {
    fn apply(self, normalized_error: f64) -> f64 {
        match self {
            BoostLoss::Linear => normalized_error,
            BoostLoss::Square => normalized_error * normalized_error,
            BoostLoss::Exponential => 1.0 - (-normalized_error).exp(),
        }
    }
}

/// AdaBoost.R2 over depth-limited regression trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub loss: BoostLoss,
    /// Depth of each weak learner
    pub max_depth: usize,
    pub random_state: u64,
    estimators: Vec<DecisionTreeRegressor>,
    estimator_weights: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            loss: BoostLoss::Linear,
            max_depth: 3,
            random_state: 42,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_loss(mut self, loss: BoostLoss) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Rounds kept after early stopping
    pub fn n_rounds(&self) -> usize {
        self.estimators.len()
    }

    pub fn estimator_weights(&self) -> &[f64] {
        &self.estimator_weights
    }
}

impl Regressor for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n = x.nrows();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut sample_weight = vec![1.0 / n as f64; n];
        let mut estimators = Vec::with_capacity(self.n_estimators);
        let mut weights = Vec::with_capacity(self.n_estimators);

        for round in 0..self.n_estimators {
            let sampler = WeightedIndex::new(&sample_weight)
                .map_err(|e| MlError::TrainingError(format!("invalid sample weights: {e}")))?;
            let rows: Vec<usize> = (0..n).map(|_| sampler.sample(&mut rng)).collect();

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(self.max_depth)
                .with_random_state(self.random_state.wrapping_add(round as u64));
            tree.fit_rows(x, y, rows)?;
            let pred = tree.predict(x)?;

            let abs_err: Vec<f64> = pred.iter().zip(y.iter()).map(|(p, t)| (p - t).abs()).collect();
            let max_err = abs_err.iter().cloned().fold(0.0, f64::max);
            let losses: Vec<f64> = abs_err
                .iter()
                .map(|&e| {
                    let normalized = if max_err > 0.0 { e / max_err } else { e };
                    self.loss.apply(normalized)
                })
                .collect();
            let avg_loss: f64 = losses.iter().zip(&sample_weight).map(|(l, w)| l * w).sum();

            if avg_loss <= 0.0 {
                // perfect fit ends boosting
                estimators.push(tree);
                weights.push(1.0);
                break;
            }
            if avg_loss >= 0.5 {
                debug!(round, avg_loss, "weak learner no better than chance, stopping");
                if estimators.is_empty() {
                    estimators.push(tree);
                    weights.push(1.0);
                }
                break;
            }

            let beta = avg_loss / (1.0 - avg_loss);
            weights.push(self.learning_rate * (1.0 / beta).ln());
            estimators.push(tree);

            for (w, l) in sample_weight.iter_mut().zip(&losses) {
                *w *= beta.powf((1.0 - l) * self.learning_rate);
            }
            let total: f64 = sample_weight.iter().sum();
            if total <= 0.0 {
                break;
            }
            sample_weight.iter_mut().for_each(|w| *w /= total);
        }

        self.estimators = estimators;
        self.estimator_weights = weights;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(MlError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;

        let per_round: Vec<Array1<f64>> = self
            .estimators
            .iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        Ok((0..x.nrows())
            .map(|i| {
                let values: Vec<f64> = per_round.iter().map(|p| p[i]).collect();
                weighted_median(&values, &self.estimator_weights)
            })
            .collect())
    }

    fn is_fitted(&self) -> bool {
        !self.estimators.is_empty()
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = param_positive_usize(name, value)?,
            "learning_rate" => {
                let lr = param_f64(name, value)?;
                if lr <= 0.0 {
                    return Err(MlError::invalid_param(name, value, "must be positive"));
                }
                self.learning_rate = lr;
            }
            "loss" => {
                self.loss = match param_str(name, value)? {
                    "linear" => BoostLoss::Linear,
                    "square" => BoostLoss::Square,
                    "exponential" => BoostLoss::Exponential,
                    _ => {
                        return Err(MlError::invalid_param(
                            name,
                            value,
                            "expected linear, square or exponential",
                        ))
                    }
                };
            }
            "max_depth" => self.max_depth = param_positive_usize(name, value)?,
            "random_state" => self.random_state = param_usize(name, value)? as u64,
            _ => return Err(unknown_param("AdaBoost Regressor", name, value)),
        }
        Ok(())
    }
}

/// Smallest value whose cumulative weight reaches half the total
fn weighted_median(values: &[f64], weights: &[f64]) -> f64 {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let half = weights.iter().sum::<f64>() / 2.0;
    let mut cumulative = 0.0;
    for &idx in &order {
        cumulative += weights[idx];
        if cumulative >= half {
            return values[idx];
        }
    }
    order.last().map_or(0.0, |&idx| values[idx])
}
