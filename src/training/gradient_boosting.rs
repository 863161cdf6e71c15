//! Gradient Boosting implementation
//!
//! Least-squares gradient boosting: every round fits a shallow regression
//! tree to the current residuals and adds a shrunken copy of it to the
//! ensemble. Optional row subsampling turns it into stochastic boosting.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::{Criterion, DecisionTreeRegressor, MaxFeatures};
use super::models::{
    check_fit_input, check_predict_input, param_f64, param_fraction, param_optional_usize,
    param_positive_usize, param_str, param_usize, unknown_param, Regressor,
};
use crate::config::ParamValue;
use crate::error::{MlError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) for each tree
    pub subsample: f64,
    pub max_features: MaxFeatures,
    pub criterion: Criterion,
    /// Random seed
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: Some(3),
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            max_features: MaxFeatures::All,
            criterion: Criterion::FriedmanMse,
            random_state: 42,
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    pub config: GradientBoostingConfig,
    trees: Vec<DecisionTreeRegressor>,
    initial_prediction: f64,
    n_features: usize,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            n_features: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = ((n as f64) * self.config.subsample).ceil().max(1.0) as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.config.n_estimators == 0 {
            return Err(MlError::invalid_param("n_estimators", 0, "must be at least 1"));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();

        // Initialize with mean
        self.initial_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for _ in 0..self.config.n_estimators {
            let residuals = y - &predictions;
            let sample_indices = self.subsample_indices(n_samples, &mut rng);

            let mut tree = DecisionTreeRegressor::new()
                .with_criterion(self.config.criterion)
                .with_min_samples_split(self.config.min_samples_split)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_max_features(self.config.max_features)
                .with_random_state(rng.gen());
            tree.max_depth = self.config.max_depth;
            tree.fit_rows(x, &residuals, sample_indices)?;

            let update = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &update);
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

        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(predictions)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let config = &mut self.config;
        match name {
            "n_estimators" => config.n_estimators = param_positive_usize(name, value)?,
            "learning_rate" => {
                let lr = param_f64(name, value)?;
                if lr <= 0.0 {
                    return Err(MlError::invalid_param(name, value, "must be positive"));
                }
                config.learning_rate = lr;
            }
            "max_depth" => config.max_depth = param_optional_usize(name, value)?,
            "min_samples_split" => {
                config.min_samples_split = param_positive_usize(name, value)?.max(2)
            }
            "min_samples_leaf" => config.min_samples_leaf = param_positive_usize(name, value)?,
            "subsample" => config.subsample = param_fraction(name, value)?,
            "max_features" => config.max_features = MaxFeatures::from_param(name, value)?,
            "criterion" => {
                config.criterion = match param_str(name, value)? {
                    "friedman_mse" => Criterion::FriedmanMse,
                    "squared_error" => Criterion::SquaredError,
                    _ => {
                        return Err(MlError::invalid_param(
                            name,
                            value,
                            "expected friedman_mse or squared_error",
                        ))
                    }
                };
            }
            "loss" => {
                if param_str(name, value)? != "squared_error" {
                    return Err(MlError::invalid_param(name, value, "only squared_error is supported"));
                }
            }
            "random_state" => config.random_state = param_usize(name, value)? as u64,
            _ => return Err(unknown_param("Gradient Boosting", name, value)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::models::r2_score;

    fn make_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((100, 2), |(i, j)| {
            if j == 0 { i as f64 / 10.0 } else { ((i * 7) % 11) as f64 }
        });
        let y = x.column(0).mapv(|v| v.sin() * 3.0) + x.column(1).mapv(|v| 0.2 * v);
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_regressor() {
        let (x, y) = make_data();
        let mut model = GradientBoostingRegressor::default();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_trees(), 100);
        let predictions = model.predict(&x).unwrap();
        assert!(r2_score(&y, &predictions).unwrap() > 0.95);
    }

    #[test]
    fn test_more_rounds_fit_better() {
        let (x, y) = make_data();
        let mut few = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 5,
            ..Default::default()
        });
        let mut many = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 50,
            ..Default::default()
        });
        few.fit(&x, &y).unwrap();
        many.fit(&x, &y).unwrap();

        let r2_few = r2_score(&y, &few.predict(&x).unwrap()).unwrap();
        let r2_many = r2_score(&y, &many.predict(&x).unwrap()).unwrap();
        assert!(r2_many > r2_few);
    }

    #[test]
    fn test_subsample_is_seeded() {
        let (x, y) = make_data();
        let config = GradientBoostingConfig {
            n_estimators: 20,
            subsample: 0.7,
            ..Default::default()
        };
        let mut a = GradientBoostingRegressor::new(config.clone());
        let mut b = GradientBoostingRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_set_param() {
        let mut model = GradientBoostingRegressor::default();
        model.set_param("learning_rate", &ParamValue::Float(0.05)).unwrap();
        model.set_param("subsample", &ParamValue::Float(0.8)).unwrap();
        model.set_param("n_estimators", &ParamValue::Int(32)).unwrap();
        assert_eq!(model.config.learning_rate, 0.05);
        assert_eq!(model.config.subsample, 0.8);
        assert_eq!(model.config.n_estimators, 32);

        assert!(model.set_param("subsample", &ParamValue::Float(1.5)).is_err());
        assert!(model.set_param("loss", &ParamValue::Str("huber".into())).is_err());
    }
}
