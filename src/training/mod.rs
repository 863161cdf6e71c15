//! Model training module
//!
//! Provides the candidate regressors and the machinery that picks one:
//! - Linear regression (OLS)
//! - Decision trees and Random Forests
//! - Gradient boosting, XGBoost-style and CatBoost-style boosting
//! - K-Nearest Neighbors
//! - AdaBoost.R2
//! - K-fold grid search, candidate evaluation and the model trainer

mod models;
pub mod adaboost;
pub mod catboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod estimator;
pub mod evaluator;
pub mod grid_search;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod trainer;
pub mod xgboost;

pub use adaboost::{AdaBoostRegressor, BoostLoss};
pub use catboost::{CatBoostConfig, CatBoostRegressor};
pub use cross_validation::{CVSplit, KFold};
pub use decision_tree::{Criterion, DecisionTreeRegressor, MaxFeatures, Splitter, TreeNode};
pub use estimator::{default_candidates, Candidate, Estimator, FittedCandidates};
pub use evaluator::{evaluate_models, EvaluationReport, ModelScore};
pub use grid_search::{expand_grid, GridPointResult, GridSearchCv, GridSearchResult, ParamPoint};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use linear_models::LinearRegression;
pub use models::{r2_score, Regressor};
pub use random_forest::RandomForestRegressor;
pub use trainer::{split_features_target, ModelTrainer, ModelTrainerConfig, TrainingSummary};
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
