//! CatBoost-style gradient boosting on symmetric (oblivious) trees
//!
//! Every level of a tree applies the same (feature, border) test to all of
//! its nodes, so a fitted tree is a list of `depth` splits plus `2^depth`
//! leaf values and a row's leaf is just the bit pattern of its test results.
//!
//! Features are quantized once per fit into at most `border_count` borders;
//! split search then works on per-leaf bin histograms.

use crate::config::ParamValue;
use crate::error::{MlError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{
    check_fit_input, check_predict_input, param_bool, param_f64, param_positive_usize,
    unknown_param, Regressor,
};

/// Largest border count whose bin ids still fit in a byte
const MAX_BORDER_COUNT: usize = 254;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostConfig {
    /// Boosting rounds
    pub iterations: usize,
    pub learning_rate: f64,
    /// Depth of every symmetric tree
    pub depth: usize,
    /// L2 regularization of leaf values
    pub l2_leaf_reg: f64,
    /// Quantization borders per feature
    pub border_count: usize,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            learning_rate: 0.03,
            depth: 6,
            l2_leaf_reg: 3.0,
            border_count: MAX_BORDER_COUNT,
        }
    }
}

/// Oblivious tree: level `k` contributes bit `k` of the leaf index
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObliviousTree {
    splits: Vec<(usize, f64)>,
    leaf_values: Vec<f64>,
}

impl ObliviousTree {
    fn leaf_index(&self, row: ArrayView1<f64>) -> usize {
        self.splits
            .iter()
            .enumerate()
            .fold(0, |leaf, (level, &(feature, border))| {
                leaf | (usize::from(row[feature] > border) << level)
            })
    }

    fn predict(&self, row: ArrayView1<f64>) -> f64 {
        self.leaf_values[self.leaf_index(row)]
    }
}

/// Per-feature borders and the bin id of every training value
struct Quantized {
    borders: Vec<Vec<f64>>,
    /// `bins[f][i]` counts the borders of feature `f` strictly below `x[i, f]`
    bins: Vec<Vec<u8>>,
}

impl Quantized {
    fn new(x: &Array2<f64>, border_count: usize) -> Self {
        let borders: Vec<Vec<f64>> = x
            .columns()
            .into_iter()
            .map(|col| select_borders(col, border_count))
            .collect();
        let bins = x
            .columns()
            .into_iter()
            .zip(&borders)
            .map(|(col, b)| {
                col.iter()
                    .map(|&v| b.partition_point(|&border| border < v) as u8)
                    .collect()
            })
            .collect();
        Self { borders, bins }
    }
}

/// Midpoints between distinct values, thinned to evenly spaced quantiles
fn select_borders(col: ArrayView1<f64>, border_count: usize) -> Vec<f64> {
    let mut values: Vec<f64> = col.to_vec();
    values.sort_by(f64::total_cmp);
    values.dedup();
    let midpoints: Vec<f64> = values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    if midpoints.len() <= border_count {
        return midpoints;
    }
    let mut picked: Vec<f64> = (0..border_count)
        .map(|k| midpoints[(k * midpoints.len() + midpoints.len() / 2) / border_count])
        .collect();
    picked.dedup();
    picked
}

/// Best (score, feature, border index) for one feature at the current level
fn best_border(
    bins: &[u8],
    n_borders: usize,
    residuals: &[f64],
    leaves: &[usize],
    n_leaves: usize,
    l2: f64,
) -> Option<(f64, usize)> {
    if n_borders == 0 {
        return None;
    }
    let n_bins = n_borders + 1;
    let mut sum = vec![0.0f64; n_leaves * n_bins];
    let mut count = vec![0.0f64; n_leaves * n_bins];
    for (i, &leaf) in leaves.iter().enumerate() {
        let slot = leaf * n_bins + bins[i] as usize;
        sum[slot] += residuals[i];
        count[slot] += 1.0;
    }

    let totals: Vec<(f64, f64)> = (0..n_leaves)
        .map(|leaf| {
            let range = leaf * n_bins..(leaf + 1) * n_bins;
            (sum[range.clone()].iter().sum::<f64>(), count[range].iter().sum::<f64>())
        })
        .collect();

    let mut left = vec![(0.0f64, 0.0f64); n_leaves];
    let mut best: Option<(f64, usize)> = None;
    for border in 0..n_borders {
        let mut score = 0.0;
        for leaf in 0..n_leaves {
            let slot = leaf * n_bins + border;
            left[leaf].0 += sum[slot];
            left[leaf].1 += count[slot];
            let (g_left, n_left) = left[leaf];
            let (g_right, n_right) = (totals[leaf].0 - g_left, totals[leaf].1 - n_left);
            score += g_left * g_left / (n_left + l2) + g_right * g_right / (n_right + l2);
        }
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, border));
        }
    }
    best
}

fn build_tree(quantized: &Quantized, residuals: &[f64], depth: usize, l2: f64) -> ObliviousTree {
    let n = residuals.len();
    let mut leaves = vec![0usize; n];
    let mut splits = Vec::with_capacity(depth);

    for level in 0..depth {
        let n_leaves = 1 << level;
        let parent_score: f64 = {
            let mut g = vec![0.0f64; n_leaves];
            let mut c = vec![0.0f64; n_leaves];
            for (i, &leaf) in leaves.iter().enumerate() {
                g[leaf] += residuals[i];
                c[leaf] += 1.0;
            }
            g.iter().zip(&c).map(|(g, c)| g * g / (c + l2)).sum()
        };

        let candidates: Vec<Option<(f64, usize)>> = (0..quantized.bins.len())
            .into_par_iter()
            .map(|f| {
                best_border(
                    &quantized.bins[f],
                    quantized.borders[f].len(),
                    residuals,
                    &leaves,
                    n_leaves,
                    l2,
                )
            })
            .collect();

        // first feature wins ties
        let mut best: Option<(f64, usize, usize)> = None;
        for (feature, candidate) in candidates.into_iter().enumerate() {
            if let Some((score, border)) = candidate {
                if best.map_or(true, |(s, _, _)| score > s) {
                    best = Some((score, feature, border));
                }
            }
        }

        let Some((score, feature, border)) = best else { break };
        if score <= parent_score + 1e-12 {
            break;
        }
        let bins = &quantized.bins[feature];
        for (i, leaf) in leaves.iter_mut().enumerate() {
            if bins[i] as usize > border {
                *leaf |= 1 << level;
            }
        }
        splits.push((feature, quantized.borders[feature][border]));
    }

    let n_leaves = 1 << splits.len();
    let mut g = vec![0.0f64; n_leaves];
    let mut c = vec![0.0f64; n_leaves];
    for (i, &leaf) in leaves.iter().enumerate() {
        g[leaf] += residuals[i];
        c[leaf] += 1.0;
    }
    let leaf_values = g.iter().zip(&c).map(|(g, c)| g / (c + l2)).collect();

    ObliviousTree { splits, leaf_values }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    pub config: CatBoostConfig,
    trees: Vec<ObliviousTree>,
    base_prediction: f64,
    n_features: usize,
}

impl Default for CatBoostRegressor {
    fn default() -> Self {
        Self::new(CatBoostConfig::default())
    }
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.config.depth = depth;
        self
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for CatBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.config.depth == 0 || self.config.depth > 16 {
            return Err(MlError::invalid_param("depth", self.config.depth, "must be in 1..=16"));
        }
        let n = x.nrows();
        let quantized = Quantized::new(x, self.config.border_count.min(MAX_BORDER_COUNT));

        self.base_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = vec![self.base_prediction; n];
        let mut trees = Vec::with_capacity(self.config.iterations);

        for _ in 0..self.config.iterations {
            let residuals: Vec<f64> = y.iter().zip(&predictions).map(|(t, p)| t - p).collect();
            let tree = build_tree(&quantized, &residuals, self.config.depth, self.config.l2_leaf_reg);
            for (i, row) in x.outer_iter().enumerate() {
                predictions[i] += self.config.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(MlError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;
        let lr = self.config.learning_rate;
        Ok(x.outer_iter()
            .map(|row| {
                self.base_prediction + lr * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
            })
            .collect())
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let config = &mut self.config;
        match name {
            "iterations" | "n_estimators" => config.iterations = param_positive_usize(name, value)?,
            "learning_rate" => {
                let lr = param_f64(name, value)?;
                if lr <= 0.0 {
                    return Err(MlError::invalid_param(name, value, "must be positive"));
                }
                config.learning_rate = lr;
            }
            "depth" | "max_depth" => {
                let depth = param_positive_usize(name, value)?;
                if depth > 16 {
                    return Err(MlError::invalid_param(name, value, "must be at most 16"));
                }
                config.depth = depth;
            }
            "l2_leaf_reg" => {
                let l2 = param_f64(name, value)?;
                if l2 < 0.0 {
                    return Err(MlError::invalid_param(name, value, "must be non-negative"));
                }
                config.l2_leaf_reg = l2;
            }
            "border_count" => {
                let count = param_positive_usize(name, value)?;
                if count > MAX_BORDER_COUNT {
                    return Err(MlError::invalid_param(name, value, "must be at most 254"));
                }
                config.border_count = count;
            }
            // accepted for compatibility with configs that silence training output
            "verbose" => {
                param_bool(name, value)?;
            }
            _ => return Err(unknown_param("CatBoosting Regressor", name, value)),
        }
        Ok(())
    }
}
