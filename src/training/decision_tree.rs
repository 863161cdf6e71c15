//! Regression tree implementation

use crate::config::ParamValue;
use crate::error::{MlError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{
    check_fit_input, check_predict_input, param_optional_usize, param_positive_usize, param_str,
    param_usize, unknown_param, Regressor,
};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    pub(crate) fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Split quality criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    SquaredError,
    /// Squared error with Friedman's improvement score; picks the same splits
    FriedmanMse,
    /// Median leaves, absolute deviation impurity
    AbsoluteError,
    /// Half Poisson deviance; targets must be non-negative
    Poisson,
}

impl Criterion {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "squared_error" | "mse" => Some(Criterion::SquaredError),
            "friedman_mse" => Some(Criterion::FriedmanMse),
            "absolute_error" | "mae" => Some(Criterion::AbsoluteError),
            "poisson" => Some(Criterion::Poisson),
            _ => None,
        }
    }
}

/// Strategy used to choose the split at each node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Splitter {
    Best,
    /// One uniformly drawn threshold per candidate feature
    Random,
}

/// Number of features examined per split
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    Fraction(f64),
    Count(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Fraction(f) => (f * n_features as f64) as usize,
            MaxFeatures::Count(c) => *c,
        };
        k.clamp(1, n_features.max(1))
    }

    pub(crate) fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::Null => Ok(MaxFeatures::All),
            ParamValue::Str(s) if s == "sqrt" || s == "auto" => Ok(MaxFeatures::Sqrt),
            ParamValue::Str(s) if s == "log2" => Ok(MaxFeatures::Log2),
            ParamValue::Float(f) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
            ParamValue::Int(i) if *i > 0 => Ok(MaxFeatures::Count(*i as usize)),
            _ => Err(MlError::invalid_param(
                name,
                value,
                "expected null, \"sqrt\", \"log2\", a fraction in (0, 1] or a positive count",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitChoice {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    root: Option<TreeNode>,
    pub criterion: Criterion,
    pub splitter: Splitter,
    /// Maximum depth, unbounded when `None`
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub random_state: u64,
    n_features: usize,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        Self {
            root: None,
            criterion: Criterion::SquaredError,
            splitter: Splitter::Best,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            random_state: 42,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_splitter(mut self, splitter: Splitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit on the rows named by `indices`; repeated indices act as sample weights.
    pub(crate) fn fit_rows(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
    ) -> Result<()> {
        if indices.is_empty() {
            return Err(MlError::InvalidInput("cannot fit a tree on zero samples".to_string()));
        }
        if self.criterion == Criterion::Poisson {
            if indices.iter().any(|&i| y[i] < 0.0) {
                return Err(MlError::InvalidInput(
                    "poisson criterion requires non-negative targets".to_string(),
                ));
            }
            if indices.iter().map(|&i| y[i]).sum::<f64>() <= 0.0 {
                return Err(MlError::InvalidInput(
                    "poisson criterion requires a positive target sum".to_string(),
                ));
            }
        }

        self.n_features = x.ncols();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        self.root = Some(self.build_node(x, y, indices, 0, &mut rng));
        Ok(())
    }

    fn build_node(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let targets: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let impurity = self.impurity(&targets);
        let leaf = || TreeNode::Leaf {
            value: self.leaf_value(&targets),
            n_samples,
        };

        if n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= f64::EPSILON
        {
            return leaf();
        }

        let Some(choice) = self.find_split(x, y, &indices, rng) else {
            return leaf();
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, choice.feature]] <= choice.threshold);
        if left_idx.len() < self.min_samples_leaf || right_idx.len() < self.min_samples_leaf {
            return leaf();
        }

        let left = Box::new(self.build_node(x, y, left_idx, depth + 1, rng));
        let right = Box::new(self.build_node(x, y, right_idx, depth + 1, rng));

        TreeNode::Split {
            feature_idx: choice.feature,
            threshold: choice.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn find_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitChoice> {
        let n_features = x.ncols();
        let k = self.max_features.resolve(n_features);
        let mut features: Vec<usize> = if k < n_features {
            rand::seq::index::sample(rng, n_features, k).into_vec()
        } else {
            (0..n_features).collect()
        };
        features.sort_unstable();

        // Random thresholds are drawn up front so the parallel scan stays deterministic
        let thresholds: Vec<Option<f64>> = match self.splitter {
            Splitter::Best => vec![None; features.len()],
            Splitter::Random => features
                .iter()
                .map(|&f| {
                    let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                        (lo.min(x[[i, f]]), hi.max(x[[i, f]]))
                    });
                    (hi > lo).then(|| rng.gen_range(lo..hi))
                })
                .collect(),
        };
        if self.splitter == Splitter::Random && thresholds.iter().all(Option::is_none) {
            return None;
        }

        let per_feature: Vec<Option<SplitChoice>> = features
            .par_iter()
            .zip(thresholds.par_iter())
            .map(|(&feature, threshold)| match threshold {
                Some(t) => self.evaluate_threshold(x, y, indices, feature, *t),
                None if self.splitter == Splitter::Best => self.best_threshold(x, y, indices, feature),
                None => None,
            })
            .collect();

        // first feature wins ties
        per_feature.into_iter().flatten().fold(None, |best: Option<SplitChoice>, c| match best {
            Some(b) if b.gain >= c.gain => Some(b),
            _ => Some(c),
        })
    }

    /// Exhaustive scan over midpoints of consecutive distinct values.
    fn best_threshold(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature: usize,
    ) -> Option<SplitChoice> {
        let mut order: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature]], y[i])).collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = order.len();
        let min_leaf = self.min_samples_leaf;
        let mut scorer = SplitScorer::new(self.criterion, &order);
        let mut best: Option<SplitChoice> = None;

        for pos in 1..n {
            scorer.move_left(order[pos - 1].1);
            if pos < min_leaf || n - pos < min_leaf {
                continue;
            }
            if order[pos].0 <= order[pos - 1].0 {
                continue;
            }
            let Some(gain) = scorer.gain() else { continue };
            if gain > f64::EPSILON && best.map_or(true, |b| gain > b.gain) {
                let mut threshold = (order[pos - 1].0 + order[pos].0) / 2.0;
                if threshold >= order[pos].0 {
                    threshold = order[pos - 1].0;
                }
                best = Some(SplitChoice { feature, threshold, gain });
            }
        }
        best
    }

    fn evaluate_threshold(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature: usize,
        threshold: f64,
    ) -> Option<SplitChoice> {
        let (left, right): (Vec<f64>, Vec<f64>) = {
            let mut left = Vec::new();
            let mut right = Vec::new();
            for &i in indices {
                if x[[i, feature]] <= threshold {
                    left.push(y[i]);
                } else {
                    right.push(y[i]);
                }
            }
            (left, right)
        };
        if left.len() < self.min_samples_leaf || right.len() < self.min_samples_leaf {
            return None;
        }
        let all: Vec<f64> = left.iter().chain(right.iter()).copied().collect();
        let parent = all.len() as f64 * self.impurity(&all);
        let children = left.len() as f64 * self.impurity(&left)
            + right.len() as f64 * self.impurity(&right);
        let gain = parent - children;
        (gain > f64::EPSILON).then_some(SplitChoice { feature, threshold, gain })
    }

    fn impurity(&self, y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        let n = y.len() as f64;
        match self.criterion {
            Criterion::SquaredError | Criterion::FriedmanMse => {
                let mean = y.iter().sum::<f64>() / n;
                y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
            }
            Criterion::AbsoluteError => {
                let mut sorted = y.to_vec();
                sorted.sort_by(f64::total_cmp);
                abs_deviation(&sorted) / n
            }
            Criterion::Poisson => {
                let mean = y.iter().sum::<f64>() / n;
                if mean <= 0.0 {
                    return 0.0;
                }
                y.iter().map(|&v| xlogy(v, v / mean)).sum::<f64>() / n
            }
        }
    }

    fn leaf_value(&self, y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        match self.criterion {
            Criterion::AbsoluteError => {
                let mut sorted = y.to_vec();
                sorted.sort_by(f64::total_cmp);
                median_sorted(&sorted)
            }
            _ => y.iter().sum::<f64>() / y.len() as f64,
        }
    }

    /// Depth in edges; a single leaf has depth 0
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.fit_rows(x, y, (0..x.nrows()).collect())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(MlError::ModelNotFitted)?;
        check_predict_input(x, self.n_features)?;
        Ok(x.outer_iter().map(|row| root.predict_row(row)).collect())
    }

    fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "criterion" => {
                let raw = param_str(name, value)?;
                self.criterion = Criterion::parse(raw)
                    .ok_or_else(|| MlError::invalid_param(name, value, "unknown criterion"))?;
            }
            "splitter" => {
                self.splitter = match param_str(name, value)? {
                    "best" => Splitter::Best,
                    "random" => Splitter::Random,
                    _ => return Err(MlError::invalid_param(name, value, "expected best or random")),
                };
            }
            "max_depth" => self.max_depth = param_optional_usize(name, value)?,
            "min_samples_split" => {
                self.min_samples_split = param_positive_usize(name, value)?.max(2)
            }
            "min_samples_leaf" => self.min_samples_leaf = param_positive_usize(name, value)?,
            "max_features" => self.max_features = MaxFeatures::from_param(name, value)?,
            "random_state" => self.random_state = param_usize(name, value)? as u64,
            _ => return Err(unknown_param("Decision Tree", name, value)),
        }
        Ok(())
    }
}

/// Incremental left/right statistics for a sorted sweep.
struct SplitScorer {
    criterion: Criterion,
    n: usize,
    total_sum: f64,
    left_n: usize,
    left_sum: f64,
    // sorted targets, kept only for absolute error
    left_sorted: Vec<f64>,
    right_sorted: Vec<f64>,
    parent_abs_dev: f64,
}

impl SplitScorer {
    fn new(criterion: Criterion, order: &[(f64, f64)]) -> Self {
        let total_sum = order.iter().map(|(_, y)| y).sum();
        let (right_sorted, parent_abs_dev) = if criterion == Criterion::AbsoluteError {
            let mut sorted: Vec<f64> = order.iter().map(|(_, y)| *y).collect();
            sorted.sort_by(f64::total_cmp);
            let dev = abs_deviation(&sorted);
            (sorted, dev)
        } else {
            (Vec::new(), 0.0)
        };
        Self {
            criterion,
            n: order.len(),
            total_sum,
            left_n: 0,
            left_sum: 0.0,
            left_sorted: Vec::new(),
            right_sorted,
            parent_abs_dev,
        }
    }

    fn move_left(&mut self, y: f64) {
        self.left_n += 1;
        self.left_sum += y;
        if self.criterion == Criterion::AbsoluteError {
            let pos = self.left_sorted.partition_point(|&v| v < y);
            self.left_sorted.insert(pos, y);
            let pos = self.right_sorted.partition_point(|&v| v < y);
            self.right_sorted.remove(pos);
        }
    }

    /// Decrease of total (unnormalized) impurity for the current split.
    fn gain(&self) -> Option<f64> {
        let nl = self.left_n as f64;
        let nr = (self.n - self.left_n) as f64;
        let n = self.n as f64;
        let sl = self.left_sum;
        let sr = self.total_sum - self.left_sum;
        match self.criterion {
            Criterion::SquaredError | Criterion::FriedmanMse => {
                Some(sl * sl / nl + sr * sr / nr - self.total_sum * self.total_sum / n)
            }
            Criterion::Poisson => {
                if sl <= 0.0 || sr <= 0.0 {
                    return None;
                }
                Some(sl * (sl / nl).ln() + sr * (sr / nr).ln() - self.total_sum * (self.total_sum / n).ln())
            }
            Criterion::AbsoluteError => Some(
                self.parent_abs_dev
                    - abs_deviation(&self.left_sorted)
                    - abs_deviation(&self.right_sorted),
            ),
        }
    }
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        0.0
    } else if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

fn abs_deviation(sorted: &[f64]) -> f64 {
    let median = median_sorted(sorted);
    sorted.iter().map(|v| (v - median).abs()).sum()
}

fn xlogy(x: f64, y: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        x * y.ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0], [5.0, 0.0], [6.0, 0.0]];
        let y = array![1.0, 1.0, 1.0, 5.0, 5.0, 5.0];
        (x, y)
    }

    #[test]
    fn test_regressor_fits_step() {
        let (x, y) = step_data();
        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        let pred = tree.predict(&x).unwrap();
        assert_eq!(pred, y);
        assert_eq!(tree.get_depth(), 1);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_unbounded_tree_memorizes() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![3.0, 1.0, 4.0, 1.0, 5.0];
        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

        let mut tree = DecisionTreeRegressor::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.get_depth() <= 2);
        assert!(tree.get_n_leaves() <= 4);
    }

    #[test]
    fn test_absolute_error_uses_median_leaves() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![1.0, 2.0, 10.0];
        let mut tree = DecisionTreeRegressor::new().with_criterion(Criterion::AbsoluteError);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&array![[1.0]]).unwrap()[0], 2.0);
    }

    #[test]
    fn test_all_criteria_split_step() {
        let (x, y) = step_data();
        for criterion in [
            Criterion::SquaredError,
            Criterion::FriedmanMse,
            Criterion::AbsoluteError,
            Criterion::Poisson,
        ] {
            let mut tree = DecisionTreeRegressor::new().with_criterion(criterion);
            tree.fit(&x, &y).unwrap();
            assert_eq!(tree.predict(&x).unwrap(), y, "{:?}", criterion);
        }
    }

    #[test]
    fn test_poisson_rejects_negative_targets() {
        let x = array![[1.0], [2.0]];
        let y = array![-1.0, 2.0];
        let mut tree = DecisionTreeRegressor::new().with_criterion(Criterion::Poisson);
        assert!(tree.fit(&x, &y).is_err());
    }

    #[test]
    fn test_random_splitter_is_seeded() {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| ((i * 7 + j * 13) % 17) as f64);
        let y = Array1::from_shape_fn(40, |i| (i % 5) as f64);

        let mut a = DecisionTreeRegressor::new().with_splitter(Splitter::Random).with_max_depth(4);
        let mut b = a.clone();
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::All.resolve(10), 10);
        assert_eq!(MaxFeatures::Sqrt.resolve(10), 3);
        assert_eq!(MaxFeatures::Log2.resolve(10), 3);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(10), 5);
        assert_eq!(MaxFeatures::Count(20).resolve(10), 10);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(10), 1);
    }

    #[test]
    fn test_set_param() {
        let mut tree = DecisionTreeRegressor::new();
        tree.set_param("criterion", &ParamValue::Str("friedman_mse".into())).unwrap();
        tree.set_param("max_depth", &ParamValue::Null).unwrap();
        tree.set_param("max_features", &ParamValue::Str("sqrt".into())).unwrap();
        assert_eq!(tree.criterion, Criterion::FriedmanMse);
        assert_eq!(tree.max_depth, None);
        assert_eq!(tree.max_features, MaxFeatures::Sqrt);

        assert!(tree.set_param("criterion", &ParamValue::Str("gini".into())).is_err());
        assert!(tree.set_param("n_estimators", &ParamValue::Int(3)).is_err());
    }

    #[test]
    fn test_predict_wrong_width() {
        let (x, y) = step_data();
        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();
        assert!(tree.predict(&array![[1.0]]).is_err());
    }
}
