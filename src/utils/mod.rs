//! Utility functions and types

pub mod data_loader;

pub use data_loader::{
    column_as_f64, column_as_strings, normalize_column_name, normalize_column_names, DataLoader,
    DataSaver,
};
