//! End-to-end pipeline stages: ingestion, transformation and prediction

pub mod ingestion;
pub mod predict;
pub mod transformation;

pub use ingestion::{split_indices, DataIngestion, DataIngestionConfig};
pub use predict::{CustomData, PredictPipeline, PredictionConfig};
pub use transformation::{DataTransformation, DataTransformationConfig, TransformedData};
