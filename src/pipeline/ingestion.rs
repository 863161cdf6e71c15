//! Raw data ingestion and train/test split

use std::path::{Path, PathBuf};

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{error, info};

use crate::error::{MlError, PipelineResult, Result, Stage, StageExt};
use crate::utils::{DataLoader, DataSaver};

/// Where ingestion writes its outputs and how it splits
#[derive(Debug, Clone)]
pub struct DataIngestionConfig {
    pub train_data_path: PathBuf,
    pub test_data_path: PathBuf,
    pub raw_data_path: PathBuf,
    /// Fraction of rows held out, rounded up
    pub test_size: f64,
    pub random_state: u64,
}

impl Default for DataIngestionConfig {
    fn default() -> Self {
        Self::in_dir("artifacts")
    }
}

impl DataIngestionConfig {
    /// Standard file names under `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            train_data_path: dir.join("train.csv"),
            test_data_path: dir.join("test.csv"),
            raw_data_path: dir.join("raw.csv"),
            test_size: 0.2,
            random_state: 42,
        }
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }
}

pub struct DataIngestion {
    config: DataIngestionConfig,
}

impl Default for DataIngestion {
    fn default() -> Self {
        Self::new(DataIngestionConfig::default())
    }
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DataIngestionConfig {
        &self.config
    }

    /// Read `source`, save a raw copy, and write a seeded train/test split.
    /// Returns the (train, test) paths.
    pub fn initiate_data_ingestion(&self, source: impl AsRef<Path>) -> PipelineResult<(PathBuf, PathBuf)> {
        info!("Entered the data ingestion method/component");
        let source = source.as_ref();
        self.ingest(source)
            .inspect_err(|e| error!(source = %source.display(), error = %e, "Error in data ingestion"))
            .stage(Stage::Ingestion)?;
        info!("Ingestion of the data is completed");
        Ok((self.config.train_data_path.clone(), self.config.test_data_path.clone()))
    }

    fn ingest(&self, source: &Path) -> Result<()> {
        if !source.exists() {
            return Err(MlError::DataError(format!(
                "source file not found: {}",
                source.display()
            )));
        }
        let df = DataLoader::new().load_csv(source)?;
        info!(rows = df.height(), cols = df.width(), "Read the dataset as dataframe");

        DataSaver::save_csv(&mut df.clone(), &self.config.raw_data_path)?;

        let (train_idx, test_idx) = split_indices(df.height(), self.config.test_size, self.config.random_state)?;
        let mut train = take_rows(&df, train_idx)?;
        let mut test = take_rows(&df, test_idx)?;

        DataSaver::save_csv(&mut train, &self.config.train_data_path)?;
        DataSaver::save_csv(&mut test, &self.config.test_data_path)?;
        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            train_path = %self.config.train_data_path.display(),
            test_path = %self.config.test_data_path.display(),
            "Saved train and test splits"
        );
        Ok(())
    }
}

/// Shuffle row indices with a seeded ChaCha8 generator; the first
/// `ceil(test_size * n)` go to the test split.
pub fn split_indices(n_rows: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(MlError::invalid_param("test_size", test_size, "must be in (0, 1)"));
    }
    let n_test = (n_rows as f64 * test_size).ceil() as usize;
    if n_rows < 2 || n_test >= n_rows {
        return Err(MlError::DataError(format!(
            "cannot split {n_rows} rows into non-empty train and test sets"
        )));
    }
    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

fn take_rows(df: &DataFrame, rows: Vec<usize>) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("idx".into(), rows.into_iter().map(|i| i as IdxSize).collect());
    Ok(df.take(&idx)?)
}
