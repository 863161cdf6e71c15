//! CSV loading and saving plus typed column access

use crate::error::{MlError, Result};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// CSV loader with schema inference
pub struct DataLoader {
    /// Rows scanned to infer column types
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(100),
        }
    }

    /// Scan the whole file to infer types
    pub fn with_full_schema_scan(mut self) -> Self {
        self.infer_schema_length = None;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let start = Instant::now();
        let file = File::open(path).map_err(|e| {
            MlError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(file)
            .finish()?;

        debug!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded csv"
        );
        Ok(df)
    }
}

pub struct DataSaver;

impl DataSaver {
    /// Save to CSV with a header row, creating parent directories
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        Ok(())
    }
}

/// snake_case a header: lowercase, runs of other characters become one `_`
pub fn normalize_column_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Rename every column of `df` with `normalize_column_name`
pub fn normalize_column_names(df: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| normalize_column_name(name.as_str()))
        .collect();
    df.set_column_names(names.iter().map(String::as_str))?;
    Ok(())
}

/// Column values as floats; nulls and unparseable strings become `None`
pub fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Column values as strings; nulls become `None`
pub fn column_as_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}
