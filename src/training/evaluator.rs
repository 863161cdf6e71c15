//! Candidate evaluation: fit or tune each model and score it on held-out data

use std::collections::HashSet;
use std::time::Instant;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::estimator::{Candidate, FittedCandidates};
use super::grid_search::{GridSearchCv, ParamPoint};
use super::models::{r2_score, Regressor};
use crate::config::ModelParams;
use crate::error::{MlError, PipelineResult, Result, Stage, StageExt};

/// Scores of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelScore {
    pub name: String,
    /// R² on the test set; this is the score models are ranked by
    pub test_score: f64,
    pub train_score: f64,
    /// Winning grid point, empty when the model was fit with defaults
    pub best_params: ParamPoint,
}

/// Test scores by model name, in candidate order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationReport {
    entries: Vec<ModelScore>,
}

impl EvaluationReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Test score of `name`
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entry(name).map(|e| e.test_score)
    }

    pub fn entry(&self, name: &str) -> Option<&ModelScore> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelScore> {
        self.entries.iter()
    }

    /// Highest test score. The first entry wins ties and NaN never wins.
    pub fn best(&self) -> Option<&ModelScore> {
        let mut best: Option<&ModelScore> = None;
        for entry in self.entries.iter().filter(|e| !e.test_score.is_nan()) {
            if best.map_or(true, |b| entry.test_score > b.test_score) {
                best = Some(entry);
            }
        }
        best
    }

    /// Entries sorted by descending test score, stable for ties, NaN last
    pub fn leaderboard(&self) -> Vec<&ModelScore> {
        let rank = |s: &ModelScore| if s.test_score.is_nan() { f64::NEG_INFINITY } else { s.test_score };
        let mut ranked: Vec<&ModelScore> = self.entries.iter().collect();
        ranked.sort_by(|a, b| rank(*b).total_cmp(&rank(*a)));
        ranked
    }

    fn push(&mut self, score: ModelScore) {
        self.entries.push(score);
    }
}

/// Fit every candidate (through a grid search when its grid is non-empty)
/// and score it on both splits.
///
/// Any failure aborts the whole evaluation; no partial report is returned.
pub fn evaluate_models<R>(
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    candidates: Vec<Candidate<R>>,
    params: &ModelParams,
) -> PipelineResult<(EvaluationReport, FittedCandidates<R>)>
where
    R: Regressor + Clone,
{
    evaluate(x_train, y_train, x_test, y_test, candidates, params)
        .inspect_err(|e| error!(error = %e, "model evaluation failed"))
        .stage(Stage::Evaluation)
}

fn evaluate<R>(
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    candidates: Vec<Candidate<R>>,
    params: &ModelParams,
) -> Result<(EvaluationReport, FittedCandidates<R>)>
where
    R: Regressor + Clone,
{
    if candidates.is_empty() {
        return Err(MlError::InvalidInput("no candidate models to evaluate".to_string()));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = candidates.iter().find(|c| !seen.insert(c.name.as_str())) {
        return Err(MlError::InvalidInput(format!("duplicate candidate name '{}'", dup.name)));
    }
    if x_train.ncols() != x_test.ncols() {
        return Err(MlError::ShapeError {
            expected: format!("{} test features", x_train.ncols()),
            actual: format!("{} test features", x_test.ncols()),
        });
    }

    let mut report = EvaluationReport::default();
    let mut fitted = Vec::with_capacity(candidates.len());

    for Candidate { name, estimator } in candidates {
        let start = Instant::now();
        let grid = params.get(&name).filter(|g| !g.is_empty());

        let (model, best_params) = match grid {
            Some(grid) => {
                let search = GridSearchCv::new(grid.clone());
                info!(model = %name, grid_points = search.n_candidates(), "running grid search");
                let result = search.fit(&estimator, x_train, y_train)?;
                (result.best_estimator, result.best_params)
            }
            None => {
                let mut model = estimator;
                model.fit(x_train, y_train)?;
                (model, ParamPoint::new())
            }
        };

        let train_score = r2_score(y_train, &model.predict(x_train)?)?;
        let test_score = r2_score(y_test, &model.predict(x_test)?)?;
        info!(
            model = %name,
            train_r2 = train_score,
            test_r2 = test_score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "model evaluated"
        );

        report.push(ModelScore {
            name: name.clone(),
            test_score,
            train_score,
            best_params,
        });
        fitted.push((name, model));
    }

    Ok((report, FittedCandidates::new(fitted)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ParamGrid, ParamValue};
    use crate::training::knn::KNNRegressor;
    use crate::training::linear_models::LinearRegression;

    fn data() -> (Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| ((i * (j + 5)) % 13) as f64);
        let y = x.column(0).mapv(|v| 2.0 * v) + x.column(1);
        let x_test = Array2::from_shape_fn((10, 2), |(i, j)| ((i * (j + 2)) % 11) as f64);
        let y_test = x_test.column(0).mapv(|v| 2.0 * v) + x_test.column(1);
        (x, y, x_test, y_test)
    }

    fn score(name: &str, test: f64) -> ModelScore {
        ModelScore {
            name: name.to_string(),
            test_score: test,
            train_score: 1.0,
            best_params: ParamPoint::new(),
        }
    }

    #[test]
    fn test_report_has_entry_per_candidate() {
        let (x, y, xt, yt) = data();
        let candidates = vec![
            Candidate::new("first", KNNRegressor::with_k(3)),
            Candidate::new("second", KNNRegressor::with_k(1)),
        ];
        let mut params = ModelParams::new();
        let mut grid = ParamGrid::new();
        grid.insert("n_neighbors".to_string(), vec![ParamValue::Int(1), ParamValue::Int(2)]);
        params.insert("second".to_string(), grid);

        let (report, fitted) = evaluate_models(&x, &y, &xt, &yt, candidates, &params).unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(fitted.len(), 2);
        assert_eq!(report.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["first", "second"]);
        assert!(report.entry("first").unwrap().best_params.is_empty());
        assert!(report.entry("second").unwrap().best_params.contains_key("n_neighbors"));
        assert!(fitted.get("first").unwrap().is_fitted());
    }

    #[test]
    fn test_empty_candidates_is_error() {
        let (x, y, xt, yt) = data();
        let err = evaluate_models::<LinearRegression>(&x, &y, &xt, &yt, vec![], &ModelParams::new())
            .unwrap_err();
        assert_eq!(err.stage, Stage::Evaluation);
        assert!(matches!(err.cause, MlError::InvalidInput(_)));
    }

    #[test]
    fn test_fit_failure_aborts_with_cause() {
        let (x, y, xt, yt) = data();
        let candidates = vec![
            Candidate::new("ok", KNNRegressor::with_k(1)),
            Candidate::new("too many neighbours", KNNRegressor::with_k(500)),
        ];
        let err = evaluate_models(&x, &y, &xt, &yt, candidates, &ModelParams::new()).unwrap_err();
        assert_eq!(err.stage, Stage::Evaluation);
        assert!(matches!(err.cause, MlError::InvalidInput(_)));
    }

    #[test]
    fn test_best_prefers_first_on_tie_and_skips_nan() {
        let mut report = EvaluationReport::default();
        report.push(score("nan", f64::NAN));
        report.push(score("a", 0.7));
        report.push(score("b", 0.9));
        report.push(score("c", 0.9));
        assert_eq!(report.best().unwrap().name, "b");
        let board: Vec<&str> = report.leaderboard().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(board, vec!["b", "c", "a", "nan"]);
        assert_eq!(report.get("a"), Some(0.7));
    }
}
