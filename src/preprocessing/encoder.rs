//! Categorical encoding

use crate::error::{MlError, Result};
use crate::utils::column_as_strings;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What to do with a category not seen during fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HandleUnknown {
    #[default]
    Error,
    /// Encode as all zeros
    Ignore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EncodedColumn {
    name: String,
    /// Sorted distinct values seen during fit
    categories: Vec<String>,
}

/// One-hot encoder. Each input column becomes one Float64 indicator column
/// per category, named `{column}_{category}`, in sorted category order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<EncodedColumn>,
    handle_unknown: HandleUnknown,
    is_fitted: bool,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            handle_unknown: HandleUnknown::Error,
            is_fitted: false,
        }
    }

    pub fn with_handle_unknown(mut self, handle_unknown: HandleUnknown) -> Self {
        self.handle_unknown = handle_unknown;
        self
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut encoded = Vec::with_capacity(columns.len());
        for &name in columns {
            let categories: BTreeSet<String> = column_as_strings(df, name)?
                .into_iter()
                .map(|v| {
                    v.ok_or_else(|| {
                        MlError::PreprocessingError(format!(
                            "column '{name}' has missing values; impute first"
                        ))
                    })
                })
                .collect::<Result<_>>()?;
            encoded.push(EncodedColumn {
                name: name.to_string(),
                categories: categories.into_iter().collect(),
            });
        }
        self.columns = encoded;
        self.is_fitted = true;
        Ok(self)
    }

    /// Output column names, in output order
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|col| col.categories.iter().map(move |cat| format!("{}_{}", col.name, cat)))
            .collect()
    }

    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.categories.as_slice())
    }

    /// Replace every fitted column with its indicator columns
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(MlError::ModelNotFitted);
        }

        let mut result = df.clone();
        for col in &self.columns {
            let values = column_as_strings(df, &col.name)?;
            let mut indicators = vec![vec![0.0f64; values.len()]; col.categories.len()];
            for (row, value) in values.iter().enumerate() {
                let value = value.as_deref().ok_or_else(|| {
                    MlError::PreprocessingError(format!("column '{}' has missing values", col.name))
                })?;
                match col.categories.binary_search_by(|c| c.as_str().cmp(value)) {
                    Ok(idx) => indicators[idx][row] = 1.0,
                    Err(_) if self.handle_unknown == HandleUnknown::Ignore => {}
                    Err(_) => {
                        return Err(MlError::PreprocessingError(format!(
                            "found unknown category '{}' in column '{}' during transform",
                            value, col.name
                        )))
                    }
                }
            }

            result.drop_in_place(&col.name)?;
            for (category, indicator) in col.categories.iter().zip(indicators) {
                let name = format!("{}_{}", col.name, category);
                result.with_column(Series::new(name.as_str().into(), indicator))?;
            }
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_as_f64;

    fn frame() -> DataFrame {
        df! {
            "lunch" => ["standard", "free/reduced", "standard"],
            "score" => [1.0, 2.0, 3.0],
        }
        .unwrap()
    }

    #[test]
    fn test_one_hot_sorted_categories() {
        let mut encoder = OneHotEncoder::new();
        let out = encoder.fit_transform(&frame(), &["lunch"]).unwrap();
        assert_eq!(
            encoder.feature_names(),
            vec!["lunch_free/reduced".to_string(), "lunch_standard".to_string()]
        );
        assert!(out.column("lunch").is_err());
        assert_eq!(
            column_as_f64(&out, "lunch_standard").unwrap(),
            vec![Some(1.0), Some(0.0), Some(1.0)]
        );
        assert!(out.column("score").is_ok());
    }

    #[test]
    fn test_unknown_category_is_error() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&frame(), &["lunch"]).unwrap();
        let unseen = df! { "lunch" => ["premium"] }.unwrap();
        let err = encoder.transform(&unseen).unwrap_err();
        assert!(err.to_string().contains("unknown category 'premium'"));
    }

    #[test]
    fn test_unknown_category_ignored() {
        let mut encoder = OneHotEncoder::new().with_handle_unknown(HandleUnknown::Ignore);
        encoder.fit(&frame(), &["lunch"]).unwrap();
        let unseen = df! { "lunch" => ["premium"] }.unwrap();
        let out = encoder.transform(&unseen).unwrap();
        assert_eq!(column_as_f64(&out, "lunch_standard").unwrap(), vec![Some(0.0)]);
    }
}
