//! XGBoost-style gradient boosting with second-order approximation
//!
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Split gain: 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)], kept only above γ
//! - Minimum child weight (hessian sum) per side
//!
//! With squared error the hessian is 1 per row, so `min_child_weight` acts as
//! a minimum leaf size.

use crate::config::ParamValue;
use crate::error::{MlError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{
    check_fit_input, check_predict_input, param_f64, param_fraction, param_positive_usize,
    param_usize, unknown_param, Regressor,
};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                XGBNode::Leaf { weight } => return *weight,
                XGBNode::Split { feature, threshold, left, right } => {
                    node = if sample[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    grad: &'a Array1<f64>,
    hess: &'a Array1<f64>,
    features: &'a [usize],
    config: &'a XGBoostConfig,
}

impl TreeBuilder<'_> {
    fn build(&self, indices: &[usize], depth: usize) -> XGBNode {
        let g_sum: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h_sum: f64 = indices.iter().map(|&i| self.hess[i]).sum();
        let weight = leaf_weight(g_sum, h_sum, self.config.reg_lambda, self.config.reg_alpha);

        if depth >= self.config.max_depth
            || indices.len() < 2
            || h_sum < 2.0 * self.config.min_child_weight
        {
            return XGBNode::Leaf { weight };
        }

        let candidates: Vec<Option<(usize, f64, f64)>> = self
            .features
            .par_iter()
            .map(|&f| self.best_split_for_feature(indices, f, g_sum, h_sum))
            .collect();
        let best = candidates.into_iter().flatten().fold(None, |best: Option<(usize, f64, f64)>, c| {
            match best {
                Some(b) if b.2 >= c.2 => Some(b),
                _ => Some(c),
            }
        });

        match best {
            Some((feature, threshold, gain)) if gain > self.config.gamma => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| self.x[[i, feature]] <= threshold);
                if left_idx.is_empty() || right_idx.is_empty() {
                    return XGBNode::Leaf { weight };
                }
                XGBNode::Split {
                    feature,
                    threshold,
                    left: Box::new(self.build(&left_idx, depth + 1)),
                    right: Box::new(self.build(&right_idx, depth + 1)),
                }
            }
            _ => XGBNode::Leaf { weight },
        }
    }

    /// Exact greedy scan of one feature: (feature, threshold, gain)
    fn best_split_for_feature(
        &self,
        indices: &[usize],
        feature: usize,
        g_total: f64,
        h_total: f64,
    ) -> Option<(usize, f64, f64)> {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

        let lambda = self.config.reg_lambda;
        let parent_score = g_total * g_total / (h_total + lambda);
        let mut g_left = 0.0;
        let mut h_left = 0.0;
        let mut best: Option<(usize, f64, f64)> = None;

        for pos in 0..sorted.len() - 1 {
            let idx = sorted[pos];
            let next = sorted[pos + 1];
            g_left += self.grad[idx];
            h_left += self.hess[idx];

            let value = self.x[[idx, feature]];
            let next_value = self.x[[next, feature]];
            if next_value <= value {
                continue;
            }

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if h_left < self.config.min_child_weight || h_right < self.config.min_child_weight {
                continue;
            }

            let gain = 0.5
                * (g_left * g_left / (h_left + lambda) + g_right * g_right / (h_right + lambda)
                    - parent_score);
            if best.map_or(true, |b| gain > b.2) {
                best = Some((feature, (value + next_value) / 2.0, gain));
            }
        }
        best
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g_adj / (h_sum + lambda)
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64 * ratio).round() as usize).clamp(1, n);
    let mut picked = rand::seq::index::sample(rng, n, k).into_vec();
    picked.sort_unstable();
    picked
}

/// XGBoost Regressor (squared error loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    pub config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
}

impl Default for XGBoostRegressor {
    fn default() -> Self {
        Self::new(XGBoostConfig::default())
    }
}

impl XGBoostRegressor {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    fn tree_sum(&self, row: ArrayView1<f64>) -> f64 {
        self.trees.iter().map(|tree| tree.predict(row)).sum::<f64>()
    }
}

impl Regressor for XGBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        self.base_score = y.mean().unwrap_or(0.0);
        let mut preds = Array1::from_elem(n_samples, self.base_score);
        let hess = Array1::from_elem(n_samples, 1.0);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for _ in 0..self.config.n_estimators {
            // squared error: grad = pred - y, hess = 1
            let grad: Array1<f64> = &preds - y;
            let rows = subsample(&mut rng, n_samples, self.config.subsample);
            let cols = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let builder = TreeBuilder {
                x,
                grad: &grad,
                hess: &hess,
                features: &cols,
                config: &self.config,
            };
            let tree = builder.build(&rows, 0);

            for (i, row) in x.outer_iter().enumerate() {
                preds[i] += self.config.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(MlError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;
        let lr = self.config.learning_rate;
        Ok(x.outer_iter()
            .map(|row| self.base_score + lr * self.tree_sum(row))
            .collect())
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let config = &mut self.config;
        let non_negative = |v: f64| -> Result<f64> {
            if v < 0.0 {
                Err(MlError::invalid_param(name, value, "must be non-negative"))
            } else {
                Ok(v)
            }
        };
        match name {
            "n_estimators" => config.n_estimators = param_positive_usize(name, value)?,
            "learning_rate" | "eta" => {
                let lr = param_f64(name, value)?;
                if lr <= 0.0 {
                    return Err(MlError::invalid_param(name, value, "must be positive"));
                }
                config.learning_rate = lr;
            }
            "max_depth" => config.max_depth = param_positive_usize(name, value)?,
            "min_child_weight" => config.min_child_weight = non_negative(param_f64(name, value)?)?,
            "reg_lambda" | "lambda" => config.reg_lambda = non_negative(param_f64(name, value)?)?,
            "reg_alpha" | "alpha" => config.reg_alpha = non_negative(param_f64(name, value)?)?,
            "gamma" => config.gamma = non_negative(param_f64(name, value)?)?,
            "subsample" => config.subsample = param_fraction(name, value)?,
            "colsample_bytree" => config.colsample_bytree = param_fraction(name, value)?,
            "random_state" => config.random_state = param_usize(name, value)? as u64,
            _ => return Err(unknown_param("XGBRegressor", name, value)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::models::r2_score;

    fn make_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((150, 3), |(i, j)| ((i * (2 * j + 1) * 7) % 31) as f64 / 3.0);
        let y = x.column(0).mapv(|v| v * v * 0.1) - &x.column(1) * 2.0 + 5.0;
        (x, y)
    }

    #[test]
    fn test_xgboost_fits_nonlinear_target() {
        let (x, y) = make_data();
        let mut model = XGBoostRegressor::default();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!(r2_score(&y, &pred).unwrap() > 0.95);
    }

    #[test]
    fn test_subsampled_fit_is_deterministic() {
        let (x, y) = make_data();
        let config = XGBoostConfig {
            n_estimators: 20,
            subsample: 0.8,
            colsample_bytree: 0.67,
            ..Default::default()
        };
        let mut a = XGBoostRegressor::new(config.clone());
        let mut b = XGBoostRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_large_gamma_prunes_everything() {
        let (x, y) = make_data();
        let mut model = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 5,
            gamma: 1e12,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(model.trees.iter().all(|t| matches!(t, XGBNode::Leaf { .. })));
        let preds = model.predict(&x).unwrap();
        assert!(preds.iter().all(|p| (p - preds[0]).abs() < 1e-12));
    }

    #[test]
    fn test_leaf_weight_soft_threshold() {
        assert_eq!(leaf_weight(0.5, 1.0, 1.0, 1.0), 0.0);
        assert!((leaf_weight(3.0, 1.0, 1.0, 1.0) + 1.0).abs() < 1e-12);
        assert!((leaf_weight(-4.0, 3.0, 1.0, 0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_set_param() {
        let mut model = XGBoostRegressor::default();
        model.set_param("learning_rate", &ParamValue::Float(0.1)).unwrap();
        model.set_param("n_estimators", &ParamValue::Int(64)).unwrap();
        model.set_param("max_depth", &ParamValue::Int(4)).unwrap();
        assert_eq!(model.config.learning_rate, 0.1);
        assert_eq!(model.config.n_estimators, 64);
        assert_eq!(model.config.max_depth, 4);
        assert!(model.set_param("gamma", &ParamValue::Float(-1.0)).is_err());
    }
}
