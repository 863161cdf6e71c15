//! Hyperparameter configuration loading
//!
//! Grids live in a YAML file under a top-level `model_parameters` key:
//!
//! ```yaml
//! model_parameters:
//!   Decision Tree:
//!     criterion: [squared_error, friedman_mse]
//!   Linear Regression: {}
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MlError, Result};

/// Top-level key holding the per-model grids
pub const MODEL_PARAMETERS_KEY: &str = "model_parameters";

/// A single candidate value for a hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as a non-negative integer
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Some(*v as usize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => f.write_str("None"),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

/// Parameter name to the list of values to search
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

/// Model display name to its grid
pub type ModelParams = BTreeMap<String, ParamGrid>;

/// Read a YAML document from disk.
pub fn load_yaml(path: impl AsRef<Path>) -> Result<serde_yaml::Value> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        MlError::ConfigError(format!("cannot read {}: {}", path.display(), e))
    })?;
    let value: serde_yaml::Value = serde_yaml::from_str(&text)?;
    Ok(value)
}

/// Load per-model grids. A document without a `model_parameters` key yields
/// an empty mapping; a model entry left blank yields an empty grid.
pub fn load_model_params(path: impl AsRef<Path>) -> Result<ModelParams> {
    let path = path.as_ref();
    let document = load_yaml(path)?;
    parse_model_params(document)
}

fn parse_model_params(document: serde_yaml::Value) -> Result<ModelParams> {
    let section = match document {
        serde_yaml::Value::Null => return Ok(ModelParams::new()),
        serde_yaml::Value::Mapping(mut map) => map.remove(MODEL_PARAMETERS_KEY),
        other => {
            return Err(MlError::ConfigError(format!(
                "expected a mapping at the document root, found {}",
                yaml_kind(&other)
            )))
        }
    };

    let Some(section) = section.filter(|v| !v.is_null()) else {
        debug!("No {} section found, using empty grids", MODEL_PARAMETERS_KEY);
        return Ok(ModelParams::new());
    };

    let raw: BTreeMap<String, Option<ParamGrid>> = serde_yaml::from_value(section)
        .map_err(|e| MlError::ConfigError(format!("invalid {}: {}", MODEL_PARAMETERS_KEY, e)))?;

    Ok(raw
        .into_iter()
        .map(|(model, grid)| (model, grid.unwrap_or_default()))
        .collect())
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}
