//! Missing value imputation

use crate::error::{MlError, Result};
use crate::utils::{column_as_f64, column_as_strings};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Strategy for imputing missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with column mean
    Mean,
    /// Replace with column median
    Median,
    /// Replace with the most frequent value; ties go to the smallest value
    MostFrequent,
    /// Replace with a constant
    Constant(String),
}

impl ImputeStrategy {
    fn is_numeric(&self) -> bool {
        matches!(self, ImputeStrategy::Mean | ImputeStrategy::Median)
    }
}

/// Fitted fill value for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillValue {
    Number(f64),
    Category(String),
}

/// Column imputer. Numeric strategies treat unparseable values as missing
/// and emit Float64 columns; the others emit String columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: BTreeMap<String, FillValue>,
}

impl Imputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: BTreeMap::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.fill_values.is_empty()
    }

    pub fn fill_value(&self, column: &str) -> Option<&FillValue> {
        self.fill_values.get(column)
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut fill_values = BTreeMap::new();
        for &name in columns {
            let fill = if self.strategy.is_numeric() {
                let values: Vec<f64> = column_as_f64(df, name)?.into_iter().flatten().collect();
                if values.is_empty() {
                    return Err(MlError::PreprocessingError(format!(
                        "column '{name}' has no values to impute from"
                    )));
                }
                FillValue::Number(match self.strategy {
                    ImputeStrategy::Mean => values.iter().sum::<f64>() / values.len() as f64,
                    _ => median(values),
                })
            } else {
                match &self.strategy {
                    ImputeStrategy::Constant(value) => FillValue::Category(value.clone()),
                    _ => {
                        let values = column_as_strings(df, name)?;
                        FillValue::Category(most_frequent(values.iter().flatten()).ok_or_else(
                            || {
                                MlError::PreprocessingError(format!(
                                    "column '{name}' has no values to impute from"
                                ))
                            },
                        )?)
                    }
                }
            };
            fill_values.insert(name.to_string(), fill);
        }
        self.fill_values = fill_values;
        Ok(self)
    }

    /// Replace missing entries of every fitted column
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted() {
            return Err(MlError::ModelNotFitted);
        }
        let mut result = df.clone();
        for (name, fill) in &self.fill_values {
            let series = match fill {
                FillValue::Number(value) => {
                    let filled: Vec<f64> = column_as_f64(df, name)?
                        .into_iter()
                        .map(|v| v.unwrap_or(*value))
                        .collect();
                    Series::new(name.as_str().into(), filled)
                }
                FillValue::Category(value) => {
                    let filled: Vec<String> = column_as_strings(df, name)?
                        .into_iter()
                        .map(|v| v.unwrap_or_else(|| value.clone()))
                        .collect();
                    Series::new(name.as_str().into(), filled)
                }
            };
            result.with_column(series)?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

/// Median of a non-empty sample, averaging the middle pair for even sizes
fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn most_frequent<'a>(values: impl Iterator<Item = &'a String>) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
        .map(|(value, _)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_impute() {
        let df = df! { "score" => [Some(1.0), None, Some(10.0), Some(4.0), Some(3.0)] }.unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let out = imputer.fit_transform(&df, &["score"]).unwrap();
        assert_eq!(imputer.fill_value("score"), Some(&FillValue::Number(3.5)));
        assert_eq!(column_as_f64(&out, "score").unwrap()[1], Some(3.5));
    }

    #[test]
    fn test_mean_impute_skips_unparseable() {
        let df = df! { "score" => ["2", "abc", "4"] }.unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Mean);
        let out = imputer.fit_transform(&df, &["score"]).unwrap();
        assert_eq!(
            column_as_f64(&out, "score").unwrap(),
            vec![Some(2.0), Some(3.0), Some(4.0)]
        );
    }

    #[test]
    fn test_most_frequent_tie_prefers_smallest() {
        let df = df! { "lunch" => [Some("standard"), Some("free"), None, Some("standard"), Some("free")] }
            .unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::MostFrequent);
        let out = imputer.fit_transform(&df, &["lunch"]).unwrap();
        assert_eq!(column_as_strings(&out, "lunch").unwrap()[2].as_deref(), Some("free"));
    }

    #[test]
    fn test_all_missing_is_error() {
        let df = df! { "score" => [None::<f64>, None] }.unwrap();
        assert!(Imputer::new(ImputeStrategy::Median).fit(&df, &["score"]).is_err());
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df! { "a" => [1.0] }.unwrap();
        assert!(matches!(
            Imputer::new(ImputeStrategy::Mean).transform(&df),
            Err(MlError::ModelNotFitted)
        ));
    }
}
