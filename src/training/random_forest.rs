//! Random Forest implementation

use crate::config::ParamValue;
use crate::error::{MlError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::decision_tree::{Criterion, DecisionTreeRegressor, MaxFeatures};
use super::models::{
    check_fit_input, check_predict_input, param_bool, param_optional_usize, param_positive_usize,
    param_str, param_usize, unknown_param, Regressor,
};

/// Random forest regressor: bootstrap-aggregated regression trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<DecisionTreeRegressor>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features per split; all features by default, as for regression forests
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub criterion: Criterion,
    pub random_state: u64,
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            criterion: Criterion::SquaredError,
            random_state: 42,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(MlError::invalid_param("n_estimators", 0, "must be at least 1"));
        }

        let n_samples = x.nrows();
        let base_seed = self.random_state;

        let trees: Result<Vec<DecisionTreeRegressor>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTreeRegressor::new()
                    .with_criterion(self.criterion)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(self.max_features)
                    .with_random_state(rng.gen());
                tree.max_depth = self.max_depth;

                tree.fit_rows(x, y, sample_indices)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(MlError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        // summed in tree order so repeated calls agree bit for bit
        let mut sum = Array1::<f64>::zeros(x.nrows());
        for pred in &per_tree {
            sum += pred;
        }
        Ok(sum / self.trees.len() as f64)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = param_positive_usize(name, value)?,
            "max_depth" => self.max_depth = param_optional_usize(name, value)?,
            "min_samples_split" => {
                self.min_samples_split = param_positive_usize(name, value)?.max(2)
            }
            "min_samples_leaf" => self.min_samples_leaf = param_positive_usize(name, value)?,
            "max_features" => self.max_features = MaxFeatures::from_param(name, value)?,
            "bootstrap" => self.bootstrap = param_bool(name, value)?,
            "criterion" => {
                self.criterion = Criterion::parse(param_str(name, value)?)
                    .ok_or_else(|| MlError::invalid_param(name, value, "unknown criterion"))?;
            }
            "random_state" => self.random_state = param_usize(name, value)? as u64,
            _ => return Err(unknown_param("Random Forest", name, value)),
        }
        Ok(())
    }
}
