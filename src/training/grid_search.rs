//! Exhaustive hyperparameter grid search with K-fold cross-validation

use std::collections::BTreeMap;
use std::time::Instant;

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cross_validation::KFold;
use super::models::{r2_score, Regressor};
use crate::config::{ParamGrid, ParamValue};
use crate::error::{MlError, Result};

/// One assignment of a value to every parameter of a grid
pub type ParamPoint = BTreeMap<String, ParamValue>;

/// Cartesian product of a grid. Keys are taken in sorted order and the last
/// key varies fastest, so the expansion order is stable for a given grid.
pub fn expand_grid(grid: &ParamGrid) -> Vec<ParamPoint> {
    let mut points = vec![ParamPoint::new()];
    for (name, values) in grid {
        points = points
            .into_iter()
            .flat_map(|point| {
                values.iter().map(move |value| {
                    let mut next = point.clone();
                    next.insert(name.clone(), value.clone());
                    next
                })
            })
            .collect();
    }
    points
}

/// Apply every parameter of `point` to `estimator`
pub fn apply_params<R: Regressor + ?Sized>(estimator: &mut R, point: &ParamPoint) -> Result<()> {
    for (name, value) in point {
        estimator.set_param(name, value)?;
    }
    Ok(())
}

/// Cross-validated score of one grid point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridPointResult {
    pub params: ParamPoint,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Outcome of a grid search: the refit winner and every point's scores
#[derive(Debug, Clone)]
pub struct GridSearchResult<R> {
    pub best_estimator: R,
    pub best_params: ParamPoint,
    pub best_score: f64,
    pub results: Vec<GridPointResult>,
}

/// Grid search over a `ParamGrid`, scored by mean R² across folds
#[derive(Debug, Clone)]
pub struct GridSearchCv {
    grid: ParamGrid,
    cv: KFold,
}

impl GridSearchCv {
    /// Three unshuffled folds
    pub fn new(grid: ParamGrid) -> Self {
        Self {
            grid,
            cv: KFold::new(3),
        }
    }

    pub fn with_cv(mut self, cv: KFold) -> Self {
        self.cv = cv;
        self
    }

    pub fn n_candidates(&self) -> usize {
        self.grid.values().map(Vec::len).product()
    }

    /// Score every grid point on every fold, then refit the best point on all
    /// of `x`. NaN scores never win; ties go to the earliest point.
    pub fn fit<R>(&self, estimator: &R, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult<R>>
    where
        R: Regressor + Clone,
    {
        if let Some((name, _)) = self.grid.iter().find(|(_, values)| values.is_empty()) {
            return Err(MlError::invalid_param(name, "[]", "grid value list is empty"));
        }
        let start = Instant::now();
        let points = expand_grid(&self.grid);

        let configured: Vec<R> = points
            .iter()
            .map(|point| {
                let mut candidate = estimator.clone();
                apply_params(&mut candidate, point)?;
                Ok(candidate)
            })
            .collect::<Result<_>>()?;

        let splits = self.cv.split(x.nrows())?;
        let folds: Vec<_> = splits.iter().map(|split| split.select(x, y)).collect();
        let n_folds = folds.len();

        let scores: Vec<f64> = (0..configured.len() * n_folds)
            .into_par_iter()
            .map(|task| {
                let (x_train, y_train, x_test, y_test) = &folds[task % n_folds];
                let mut model = configured[task / n_folds].clone();
                model.fit(x_train, y_train)?;
                r2_score(y_test, &model.predict(x_test)?)
            })
            .collect::<Result<_>>()?;

        let results: Vec<GridPointResult> = points
            .into_iter()
            .zip(scores.chunks(n_folds))
            .map(|(params, fold_scores)| GridPointResult {
                mean_score: fold_scores.iter().sum::<f64>() / n_folds as f64,
                fold_scores: fold_scores.to_vec(),
                params,
            })
            .collect();

        let mut best_idx = 0;
        for (idx, result) in results.iter().enumerate() {
            if rank_score(result.mean_score) > rank_score(results[best_idx].mean_score) {
                best_idx = idx;
            }
        }

        let mut best_estimator = configured[best_idx].clone();
        best_estimator.fit(x, y)?;

        let best = &results[best_idx];
        debug!(
            points = results.len(),
            folds = n_folds,
            best_score = best.mean_score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "grid search finished"
        );

        Ok(GridSearchResult {
            best_estimator,
            best_params: best.params.clone(),
            best_score: best.mean_score,
            results,
        })
    }
}

fn rank_score(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::knn::KNNRegressor;

    fn grid(entries: &[(&str, Vec<ParamValue>)]) -> ParamGrid {
        entries
            .iter()
            .map(|(name, values)| (name.to_string(), values.clone()))
            .collect()
    }

    #[test]
    fn test_expand_grid_order() {
        let g = grid(&[
            ("weights", vec![ParamValue::Str("uniform".into()), ParamValue::Str("distance".into())]),
            ("n_neighbors", vec![ParamValue::Int(3), ParamValue::Int(5), ParamValue::Int(7)]),
        ]);
        let points = expand_grid(&g);
        assert_eq!(points.len(), 6);
        // sorted keys: n_neighbors outer, weights inner
        assert_eq!(points[0]["n_neighbors"], ParamValue::Int(3));
        assert_eq!(points[0]["weights"], ParamValue::Str("uniform".into()));
        assert_eq!(points[1]["weights"], ParamValue::Str("distance".into()));
        assert_eq!(points[2]["n_neighbors"], ParamValue::Int(5));
    }

    #[test]
    fn test_expand_empty_grid_is_single_point() {
        let points = expand_grid(&ParamGrid::new());
        assert_eq!(points.len(), 1);
        assert!(points[0].is_empty());
    }

    #[test]
    fn test_grid_search_picks_best_k() {
        // y depends only on x, so small k generalizes best
        let x = Array2::from_shape_fn((60, 1), |(i, _)| ((i * 17) % 60) as f64);
        let y = x.column(0).mapv(|v| v * 2.0);
        let g = grid(&[("n_neighbors", vec![ParamValue::Int(30), ParamValue::Int(1)])]);

        let search = GridSearchCv::new(g);
        assert_eq!(search.n_candidates(), 2);
        let result = search.fit(&KNNRegressor::default(), &x, &y).unwrap();

        assert_eq!(result.best_params["n_neighbors"], ParamValue::Int(1));
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].fold_scores.len(), 3);
        assert_eq!(result.best_estimator.config.n_neighbors, 1);
        assert!(result.best_estimator.is_fitted());
    }

    #[test]
    fn test_unknown_parameter_fails() {
        let x = Array2::from_shape_fn((9, 1), |(i, _)| i as f64);
        let y = x.column(0).to_owned();
        let g = grid(&[("max_depth", vec![ParamValue::Int(2)])]);
        let err = GridSearchCv::new(g).fit(&KNNRegressor::default(), &x, &y).unwrap_err();
        assert!(matches!(err, MlError::InvalidParameter { .. }));
    }

    #[test]
    fn test_empty_value_list_fails() {
        let x = Array2::from_shape_fn((9, 1), |(i, _)| i as f64);
        let y = x.column(0).to_owned();
        let g = grid(&[("n_neighbors", vec![])]);
        assert!(GridSearchCv::new(g).fit(&KNNRegressor::default(), &x, &y).is_err());
    }

    #[test]
    fn test_nan_never_wins() {
        assert!(rank_score(f64::NAN) < rank_score(-1e300));
    }
}
