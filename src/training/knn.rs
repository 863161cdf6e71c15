//! K-Nearest Neighbors regression
//!
//! Brute-force neighbor search with a bounded max-heap per query; queries
//! run in parallel.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::models::{
    check_fit_input, check_predict_input, param_f64, param_positive_usize, param_str,
    unknown_param, Regressor,
};
use crate::config::ParamValue;
use crate::error::{MlError, Result};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
    Chebyshev,
}

impl DistanceMetric {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let diffs = a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs());
        match self {
            DistanceMetric::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            DistanceMetric::Manhattan => diffs.sum(),
            DistanceMetric::Minkowski(p) => diffs.map(|d| d.powf(*p)).sum::<f64>().powf(1.0 / p),
            DistanceMetric::Chebyshev => diffs.fold(0.0, f64::max),
        }
    }

    /// Minkowski exponent as used by `p`
    fn from_p(p: f64) -> Self {
        if p == 1.0 {
            DistanceMetric::Manhattan
        } else if p == 2.0 {
            DistanceMetric::Euclidean
        } else {
            DistanceMetric::Minkowski(p)
        }
    }
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNRegressor {
    pub config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KNNRegressor {
    fn default() -> Self {
        Self::new(KNNConfig::default())
    }
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }
}

impl Regressor for KNNRegressor {
    /// Stores the training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.config.n_neighbors > x.nrows() {
            return Err(MlError::InvalidInput(format!(
                "n_neighbors = {} exceeds the {} training samples",
                self.config.n_neighbors,
                x.nrows()
            )));
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x_train), Some(y_train)) => (x_train, y_train),
            _ => return Err(MlError::ModelNotFitted),
        };
        check_predict_input(x, x_train.ncols())?;

        let k = self.config.n_neighbors;
        let metric = self.config.metric;
        let weights = self.config.weights;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, k, metric);
                weighted_mean(&neighbors, y_train, weights)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_neighbors" => self.config.n_neighbors = param_positive_usize(name, value)?,
            "weights" => {
                self.config.weights = match param_str(name, value)? {
                    "uniform" => WeightScheme::Uniform,
                    "distance" => WeightScheme::Distance,
                    _ => return Err(MlError::invalid_param(name, value, "expected uniform or distance")),
                };
            }
            "p" => {
                let p = param_f64(name, value)?;
                if p < 1.0 {
                    return Err(MlError::invalid_param(name, value, "must be at least 1"));
                }
                self.config.metric = DistanceMetric::from_p(p);
            }
            "metric" => {
                self.config.metric = match param_str(name, value)? {
                    "euclidean" | "minkowski" => DistanceMetric::Euclidean,
                    "manhattan" | "cityblock" => DistanceMetric::Manhattan,
                    "chebyshev" => DistanceMetric::Chebyshev,
                    _ => return Err(MlError::invalid_param(name, value, "unsupported metric")),
                };
            }
            _ => return Err(unknown_param("K-Neighbour Regressor", name, value)),
        }
        Ok(())
    }
}

/// Max-heap entry ordered by (distance, training index)
#[derive(PartialEq)]
struct Neighbor {
    dist: f64,
    idx: usize,
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.idx.cmp(&other.idx))
    }
}

/// Find k nearest neighbors using a max-heap. Ties go to the lower index.
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<Neighbor> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (idx, row) in x_train.outer_iter().enumerate() {
        let candidate = Neighbor {
            dist: metric.distance(point, row),
            idx,
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().map_or(false, |top| candidate < *top) {
            heap.pop();
            heap.push(candidate);
        }
    }

    heap.into_sorted_vec()
}

fn weighted_mean(neighbors: &[Neighbor], y_train: &Array1<f64>, weights: WeightScheme) -> f64 {
    if neighbors.is_empty() {
        return 0.0;
    }
    match weights {
        WeightScheme::Uniform => {
            neighbors.iter().map(|n| y_train[n.idx]).sum::<f64>() / neighbors.len() as f64
        }
        WeightScheme::Distance => {
            // exact matches take all the weight
            let exact: Vec<f64> = neighbors
                .iter()
                .filter(|n| n.dist == 0.0)
                .map(|n| y_train[n.idx])
                .collect();
            if !exact.is_empty() {
                return exact.iter().sum::<f64>() / exact.len() as f64;
            }
            let (num, den) = neighbors.iter().fold((0.0, 0.0), |(num, den), n| {
                let w = 1.0 / n.dist;
                (num + w * y_train[n.idx], den + w)
            });
            num / den
        }
    }
}
