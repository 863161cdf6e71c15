//! Serializable wrapper over the candidate regressors

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::adaboost::AdaBoostRegressor;
use super::catboost::CatBoostRegressor;
use super::decision_tree::DecisionTreeRegressor;
use super::gradient_boosting::GradientBoostingRegressor;
use super::knn::KNNRegressor;
use super::linear_models::LinearRegression;
use super::models::Regressor;
use super::random_forest::RandomForestRegressor;
use super::xgboost::XGBoostRegressor;
use crate::config::ParamValue;
use crate::error::Result;

/// Any of the candidate algorithms, fitted or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    RandomForest(RandomForestRegressor),
    DecisionTree(DecisionTreeRegressor),
    GradientBoosting(GradientBoostingRegressor),
    LinearRegression(LinearRegression),
    KNeighbors(KNNRegressor),
    XGBoost(XGBoostRegressor),
    CatBoost(CatBoostRegressor),
    AdaBoost(AdaBoostRegressor),
}

impl Estimator {
    /// Algorithm name, independent of the candidate's display name
    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::RandomForest(_) => "RandomForestRegressor",
            Estimator::DecisionTree(_) => "DecisionTreeRegressor",
            Estimator::GradientBoosting(_) => "GradientBoostingRegressor",
            Estimator::LinearRegression(_) => "LinearRegression",
            Estimator::KNeighbors(_) => "KNeighborsRegressor",
            Estimator::XGBoost(_) => "XGBRegressor",
            Estimator::CatBoost(_) => "CatBoostRegressor",
            Estimator::AdaBoost(_) => "AdaBoostRegressor",
        }
    }
}

impl Regressor for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Estimator::RandomForest(m) => m.fit(x, y),
            Estimator::DecisionTree(m) => m.fit(x, y),
            Estimator::GradientBoosting(m) => m.fit(x, y),
            Estimator::LinearRegression(m) => m.fit(x, y),
            Estimator::KNeighbors(m) => m.fit(x, y),
            Estimator::XGBoost(m) => m.fit(x, y),
            Estimator::CatBoost(m) => m.fit(x, y),
            Estimator::AdaBoost(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::RandomForest(m) => m.predict(x),
            Estimator::DecisionTree(m) => m.predict(x),
            Estimator::GradientBoosting(m) => m.predict(x),
            Estimator::LinearRegression(m) => m.predict(x),
            Estimator::KNeighbors(m) => m.predict(x),
            Estimator::XGBoost(m) => m.predict(x),
            Estimator::CatBoost(m) => m.predict(x),
            Estimator::AdaBoost(m) => m.predict(x),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            Estimator::RandomForest(m) => m.is_fitted(),
            Estimator::DecisionTree(m) => m.is_fitted(),
            Estimator::GradientBoosting(m) => m.is_fitted(),
            Estimator::LinearRegression(m) => m.is_fitted(),
            Estimator::KNeighbors(m) => m.is_fitted(),
            Estimator::XGBoost(m) => m.is_fitted(),
            Estimator::CatBoost(m) => m.is_fitted(),
            Estimator::AdaBoost(m) => m.is_fitted(),
        }
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match self {
            Estimator::RandomForest(m) => m.set_param(name, value),
            Estimator::DecisionTree(m) => m.set_param(name, value),
            Estimator::GradientBoosting(m) => m.set_param(name, value),
            Estimator::LinearRegression(m) => m.set_param(name, value),
            Estimator::KNeighbors(m) => m.set_param(name, value),
            Estimator::XGBoost(m) => m.set_param(name, value),
            Estimator::CatBoost(m) => m.set_param(name, value),
            Estimator::AdaBoost(m) => m.set_param(name, value),
        }
    }
}

/// A named, not yet fitted model
#[derive(Debug, Clone)]
pub struct Candidate<R> {
    pub name: String,
    pub estimator: R,
}

impl<R> Candidate<R> {
    pub fn new(name: impl Into<String>, estimator: R) -> Self {
        Self {
            name: name.into(),
            estimator,
        }
    }
}

/// Fitted estimators by display name, in candidate order
#[derive(Debug, Clone)]
pub struct FittedCandidates<R> {
    entries: Vec<(String, R)>,
}

impl<R> FittedCandidates<R> {
    pub(crate) fn new(entries: Vec<(String, R)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&R> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    /// Take ownership of one fitted estimator
    pub fn remove(&mut self, name: &str) -> Option<R> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The fixed candidate set, in selection order
pub fn default_candidates() -> Vec<Candidate<Estimator>> {
    vec![
        Candidate::new("Random Forest", Estimator::RandomForest(RandomForestRegressor::default())),
        Candidate::new("Decision Tree", Estimator::DecisionTree(DecisionTreeRegressor::default())),
        Candidate::new(
            "Gradient Boosting",
            Estimator::GradientBoosting(GradientBoostingRegressor::default()),
        ),
        Candidate::new("Linear Regression", Estimator::LinearRegression(LinearRegression::default())),
        Candidate::new("K-Neighbour Regressor", Estimator::KNeighbors(KNNRegressor::default())),
        Candidate::new("XGBRegressor", Estimator::XGBoost(XGBoostRegressor::default())),
        Candidate::new("CatBoosting Regressor", Estimator::CatBoost(CatBoostRegressor::default())),
        Candidate::new("AdaBoost Regressor", Estimator::AdaBoost(AdaBoostRegressor::default())),
    ]
}
