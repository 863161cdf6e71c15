//! Integration test: model evaluation, selection and persistence

use mlproject::artifacts::load_object;
use mlproject::config::{ModelParams, ParamGrid, ParamValue};
use mlproject::error::{MlError, Result, Stage};
use mlproject::training::{
    evaluate_models, Candidate, Estimator, ModelTrainer, ModelTrainerConfig, Regressor,
};
use ndarray::{array, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Predicts `k * x[0]`. On zero-mean targets equal to `x[0]` this scores
/// exactly `1 - (1 - k)^2`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Scaled {
    k: f64,
    fitted: bool,
}

impl Scaled {
    fn scoring(r2: f64) -> Self {
        Self { k: 1.0 - (1.0 - r2).sqrt(), fitted: false }
    }
}

impl Regressor for Scaled {
    fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(MlError::ModelNotFitted);
        }
        Ok(x.column(0).mapv(|v| v * self.k))
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        Err(MlError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: "no parameters".to_string(),
        })
    }
}

/// Mean predictor that counts its fits across clones
#[derive(Debug, Clone, Default)]
struct Counting {
    fits: Arc<AtomicUsize>,
    mean: Option<f64>,
    shift: f64,
}

impl Regressor for Counting {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fits.fetch_add(1, Ordering::SeqCst);
        self.mean = y.mean();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mean = self.mean.ok_or(MlError::ModelNotFitted)?;
        Ok(Array1::from_elem(x.nrows(), mean + self.shift))
    }

    fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "shift" => {
                self.shift = value.as_float().unwrap_or(0.0);
                Ok(())
            }
            _ => Err(MlError::InvalidParameter {
                name: name.to_string(),
                value: value.to_string(),
                reason: "unknown".to_string(),
            }),
        }
    }
}

/// Feature column equal to a zero-mean target, target appended last
fn split_arrays() -> (Array2<f64>, Array2<f64>) {
    let train = array![[-4.0, -4.0], [-2.0, -2.0], [-1.0, -1.0], [1.0, 1.0], [2.0, 2.0], [4.0, 4.0]];
    let test = array![[-3.0, -3.0], [-1.0, -1.0], [1.0, 1.0], [3.0, 3.0]];
    (train, test)
}

fn trainer(dir: &TempDir, min_score: f64) -> ModelTrainer {
    let params_path = dir.path().join("model_params.yaml");
    std::fs::write(&params_path, "model_parameters:\n").unwrap();
    ModelTrainer::new(
        ModelTrainerConfig::default()
            .with_model_path(dir.path().join("model.pkl"))
            .with_params_path(params_path)
            .with_min_score(min_score),
    )
}

#[test]
fn test_best_of_two_is_selected_and_persisted() {
    let dir = TempDir::new().unwrap();
    let (train, test) = split_arrays();
    let candidates = vec![
        Candidate::new("A", Scaled::scoring(0.5)),
        Candidate::new("B", Scaled::scoring(0.8)),
    ];

    let summary = trainer(&dir, 0.6).train_candidates(&train, &test, candidates).unwrap();

    assert_eq!(summary.report.len(), 2);
    assert!((summary.report.get("A").unwrap() - 0.5).abs() < 1e-9);
    assert!((summary.report.get("B").unwrap() - 0.8).abs() < 1e-9);
    assert_eq!(summary.best_model_name, "B");
    assert!((summary.final_score - 0.8).abs() < 1e-9);

    let restored: Scaled = load_object(dir.path().join("model.pkl")).unwrap();
    assert!(restored.is_fitted());
    assert!((restored.k - Scaled::scoring(0.8).k).abs() < 1e-12);
}

#[test]
fn test_below_threshold_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let (train, test) = split_arrays();
    let candidates = vec![
        Candidate::new("A", Scaled::scoring(0.3)),
        Candidate::new("B", Scaled::scoring(0.5)),
    ];

    let err = trainer(&dir, 0.6).train_candidates(&train, &test, candidates).unwrap_err();

    assert_eq!(err.stage, Stage::Evaluation);
    match err.cause {
        MlError::BelowThreshold { best, threshold } => {
            assert!((best - 0.5).abs() < 1e-9);
            assert_eq!(threshold, 0.6);
        }
        other => panic!("unexpected cause: {other}"),
    }
    assert!(!dir.path().join("model.pkl").exists());
}

#[test]
fn test_tie_goes_to_first_candidate() {
    let dir = TempDir::new().unwrap();
    let (train, test) = split_arrays();
    let candidates = vec![
        Candidate::new("first", Scaled::scoring(0.9)),
        Candidate::new("second", Scaled::scoring(0.9)),
    ];
    let summary = trainer(&dir, 0.6).train_candidates(&train, &test, candidates).unwrap();
    assert_eq!(summary.best_model_name, "first");
}

#[test]
fn test_empty_grid_fits_once() {
    let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
    let y = x.column(0).to_owned();
    let model = Counting::default();
    let fits = Arc::clone(&model.fits);

    let mut params = ModelParams::new();
    params.insert("counting".to_string(), ParamGrid::new());
    let (report, fitted) =
        evaluate_models(&x, &y, &x, &y, vec![Candidate::new("counting", model)], &params).unwrap();

    assert_eq!(fits.load(Ordering::SeqCst), 1);
    assert_eq!(report.len(), 1);
    assert!(fitted.get("counting").unwrap().is_fitted());
    assert!(report.entry("counting").unwrap().best_params.is_empty());
}

#[test]
fn test_grid_runs_search_then_refits() {
    let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
    let y = x.column(0).to_owned();
    let model = Counting::default();
    let fits = Arc::clone(&model.fits);

    let mut grid = ParamGrid::new();
    grid.insert("shift".to_string(), vec![ParamValue::Float(5.0), ParamValue::Float(0.0)]);
    let mut params = ModelParams::new();
    params.insert("counting".to_string(), grid);

    let (report, _) =
        evaluate_models(&x, &y, &x, &y, vec![Candidate::new("counting", model)], &params).unwrap();

    // two points on three folds, then one refit on everything
    assert_eq!(fits.load(Ordering::SeqCst), 7);
    let best = &report.entry("counting").unwrap().best_params;
    assert_eq!(best.get("shift"), Some(&ParamValue::Float(0.0)));
}

#[test]
fn test_unknown_grid_parameter_is_rejected() {
    let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
    let y = x.column(0).to_owned();
    let mut grid = ParamGrid::new();
    grid.insert("depth".to_string(), vec![ParamValue::Int(3)]);
    let mut params = ModelParams::new();
    params.insert("counting".to_string(), grid);

    let err = evaluate_models(&x, &y, &x, &y, vec![Candidate::new("counting", Counting::default())], &params)
        .unwrap_err();
    assert_eq!(err.stage, Stage::Evaluation);
    assert!(matches!(err.cause, MlError::InvalidParameter { .. }));
}

#[test]
fn test_default_candidates_on_linear_data() {
    let dir = TempDir::new().unwrap();
    let params_path = dir.path().join("model_params.yaml");
    std::fs::write(
        &params_path,
        "model_parameters:\n  K-Neighbour Regressor:\n    n_neighbors: [3, 5]\n  CatBoosting Regressor:\n    iterations: [50]\n",
    )
    .unwrap();

    let make = |n: usize, offset: usize| {
        let mut data = Array2::zeros((n, 3));
        for i in 0..n {
            let a = ((i + offset) * 7 % 23) as f64;
            let b = ((i + offset) * 5 % 17) as f64;
            data[[i, 0]] = a;
            data[[i, 1]] = b;
            data[[i, 2]] = 3.0 * a - 2.0 * b + 1.0;
        }
        data
    };
    let train = make(80, 0);
    let test = make(20, 3);

    let trainer = ModelTrainer::new(
        ModelTrainerConfig::default()
            .with_model_path(dir.path().join("model.pkl"))
            .with_params_path(&params_path),
    );
    let summary = trainer.initiate_model_trainer(&train, &test).unwrap();

    assert_eq!(summary.report.len(), 8);
    assert_eq!(summary.best_model_name, "Linear Regression");
    assert!(summary.final_score > 0.999);

    let model: Estimator = load_object(dir.path().join("model.pkl")).unwrap();
    assert_eq!(model.kind(), "LinearRegression");
}
