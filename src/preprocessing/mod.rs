//! Data preprocessing module
//!
//! Column-wise preprocessing for tabular data:
//! - Missing value imputation (mean, median, most frequent, constant)
//! - Feature scaling (standard, scale-only)
//! - One-hot encoding of categorical columns
//! - `DataPreprocessor`, which chains them into a fitted, persistable transformer

mod config;
mod encoder;
mod imputer;
mod pipeline;
mod scaler;

pub use config::PreprocessingConfig;
pub use encoder::{HandleUnknown, OneHotEncoder};
pub use imputer::{FillValue, ImputeStrategy, Imputer};
pub use pipeline::DataPreprocessor;
pub use scaler::{Scaler, ScalerType};
