//! Preprocessing configuration

use serde::{Deserialize, Serialize};
use super::ImputeStrategy;

/// Which columns go through which branch, and how they are imputed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Imputed, then standard scaled
    pub numeric_columns: Vec<String>,

    /// Imputed, one-hot encoded, then scaled without centering
    pub categorical_columns: Vec<String>,

    pub numeric_impute_strategy: ImputeStrategy,

    pub categorical_impute_strategy: ImputeStrategy,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            numeric_columns: vec!["reading_score".to_string(), "writing_score".to_string()],
            categorical_columns: vec![
                "gender".to_string(),
                "race_ethnicity".to_string(),
                "parental_level_of_education".to_string(),
                "lunch".to_string(),
                "test_preparation_course".to_string(),
            ],
            numeric_impute_strategy: ImputeStrategy::Median,
            categorical_impute_strategy: ImputeStrategy::MostFrequent,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.numeric_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_categorical_columns<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.categorical_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_numeric_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.numeric_impute_strategy = strategy;
        self
    }

    pub fn with_categorical_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.categorical_impute_strategy = strategy;
        self
    }
}
