//! Command-line interface
//!
//! Runs the pipeline stages, batch prediction and the web server.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::pipeline::{
    DataIngestion, DataIngestionConfig, DataTransformation, DataTransformationConfig,
    PredictPipeline, PredictionConfig,
};
use crate::server::{run_server, ServerConfig};
use crate::training::{EvaluationReport, ModelTrainer, ModelTrainerConfig, TrainingSummary};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_ok(msg: &str, detail: &str) {
    println!("  {} {} {}", ok("✓"), msg, dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "mlproject")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Student score regression: ingest, transform, train, predict and serve")]
#[command(long_about = None)]
pub struct Cli {
    /// Directory for split files and persisted artifacts
    #[arg(long, global = true, default_value = "artifacts")]
    pub artifacts: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest, transform and train in one go
    Run {
        /// Source CSV dataset
        #[arg(short, long)]
        source: PathBuf,

        /// Hyperparameter grid file
        #[arg(long, default_value = "config/model_params.yaml")]
        params: PathBuf,

        /// Minimum test R² for the best model to be persisted
        #[arg(long, default_value = "0.6")]
        min_score: f64,
    },

    /// Split the source dataset and fit the preprocessor
    Ingest {
        /// Source CSV dataset
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Train on the existing train/test split files
    Train {
        /// Hyperparameter grid file
        #[arg(long, default_value = "config/model_params.yaml")]
        params: PathBuf,

        /// Minimum test R² for the best model to be persisted
        #[arg(long, default_value = "0.6")]
        min_score: f64,
    },

    /// Predict every row of a CSV file with the persisted artifacts
    Predict {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Write the input rows with a prediction column here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the prediction web server
    Serve {
        /// Bind address (defaults to API_HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Port (defaults to API_PORT or 5001)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Dispatch a parsed command line
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let artifacts = cli.artifacts;
    match cli.command {
        Commands::Run { source, params, min_score } => cmd_run(&artifacts, &source, &params, min_score),
        Commands::Ingest { source } => cmd_ingest(&artifacts, &source),
        Commands::Train { params, min_score } => cmd_train(&artifacts, &params, min_score),
        Commands::Predict { data, output } => cmd_predict(&artifacts, &data, output.as_deref()),
        Commands::Serve { host, port } => cmd_serve(&artifacts, host, port).await,
    }
}

fn transformation_config(artifacts: &Path) -> DataTransformationConfig {
    DataTransformationConfig::default().with_preprocessor_path(artifacts.join("preprocessor.pkl"))
}

fn trainer_config(artifacts: &Path, params: &Path, min_score: f64) -> ModelTrainerConfig {
    ModelTrainerConfig::default()
        .with_model_path(artifacts.join("model.pkl"))
        .with_params_path(params)
        .with_min_score(min_score)
}

/// Full run: ingestion, transformation and training
pub fn cmd_run(artifacts: &Path, source: &Path, params: &Path, min_score: f64) -> anyhow::Result<()> {
    let start = Instant::now();
    section("Data");
    let (train_path, test_path) = ingest(artifacts, source)?;

    section("Training");
    let summary = train(artifacts, &train_path, &test_path, params, min_score)?;
    print_summary(&summary);
    println!();
    println!("  {} {}", ok("finished in"), dim(&format!("{:.2?}", start.elapsed())));
    Ok(())
}

pub fn cmd_ingest(artifacts: &Path, source: &Path) -> anyhow::Result<()> {
    section("Data");
    let (train_path, test_path) = ingest(artifacts, source)?;

    step_run("Fitting preprocessor");
    let transformed = DataTransformation::new(transformation_config(artifacts))
        .initiate_data_transformation(&train_path, &test_path)?;
    step_ok(
        "Preprocessor saved",
        &format!("train {:?}, test {:?}", transformed.train.dim(), transformed.test.dim()),
    );
    println!();
    kv("Preprocessor", &transformed.preprocessor_path.display().to_string());
    Ok(())
}

pub fn cmd_train(artifacts: &Path, params: &Path, min_score: f64) -> anyhow::Result<()> {
    let split = DataIngestionConfig::in_dir(artifacts);
    section("Training");
    let summary = train(artifacts, &split.train_data_path, &split.test_data_path, params, min_score)?;
    print_summary(&summary);
    Ok(())
}

pub fn cmd_predict(artifacts: &Path, data: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let config = PredictionConfig::new(artifacts.join("model.pkl"), artifacts.join("preprocessor.pkl"));
    let pipeline = PredictPipeline::load(&config)?;
    step_ok("Loaded model", pipeline.model().kind());

    let start = Instant::now();
    let predictions = pipeline.predict_csv(data, output)?;
    step_ok(
        &format!("Predicted {} rows", predictions.len()),
        &format!("{:.2?}", start.elapsed()),
    );

    match output {
        Some(path) => kv("Output", &path.display().to_string()),
        None => {
            section("Predictions");
            for (i, p) in predictions.iter().enumerate().take(20) {
                println!("  {:<6} {:.2}", muted(&i.to_string()), p);
            }
            if predictions.len() > 20 {
                println!("  {}", dim(&format!("... {} more", predictions.len() - 20)));
            }
        }
    }
    Ok(())
}

pub async fn cmd_serve(artifacts: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = ServerConfig::default();
    if std::env::var_os("MODEL_PATH").is_none() {
        config.model_path = artifacts.join("model.pkl");
    }
    if std::env::var_os("PREPROCESSOR_PATH").is_none() {
        config.preprocessor_path = artifacts.join("preprocessor.pkl");
    }
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    println!();
    println!("  {} {}", accent("Serving on"), format!("http://{}:{}", config.host, config.port).white().bold());
    println!("  {}", dim("press ctrl+c to stop"));
    run_server(config).await
}

fn ingest(artifacts: &Path, source: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    step_run("Ingesting");
    let (train_path, test_path) =
        DataIngestion::new(DataIngestionConfig::in_dir(artifacts)).initiate_data_ingestion(source)?;
    step_ok("Split written", &source.display().to_string());
    kv("Train", &train_path.display().to_string());
    kv("Test", &test_path.display().to_string());
    Ok((train_path, test_path))
}

fn train(
    artifacts: &Path,
    train_path: &Path,
    test_path: &Path,
    params: &Path,
    min_score: f64,
) -> anyhow::Result<TrainingSummary> {
    step_run("Transforming");
    let transformed = DataTransformation::new(transformation_config(artifacts))
        .initiate_data_transformation(train_path, test_path)?;
    step_ok("Features ready", &format!("{} columns", transformed.train.ncols() - 1));

    step_run("Evaluating candidate models");
    let start = Instant::now();
    let summary = ModelTrainer::new(trainer_config(artifacts, params, min_score))
        .initiate_model_trainer(&transformed.train, &transformed.test)?;
    step_ok("Model selected", &format!("{:.2?}", start.elapsed()));
    Ok(summary)
}

fn print_summary(summary: &TrainingSummary) {
    print_leaderboard(&summary.report);
    println!();
    kv("Best model", &summary.best_model_name);
    kv("Test R²", &format!("{:.4}", summary.final_score));
    kv("Saved to", &summary.model_path.display().to_string());
}

fn print_leaderboard(report: &EvaluationReport) {
    println!();
    println!("  {:<26} {:>10} {:>10}", muted("Model"), muted("Test R²"), muted("Train R²"));
    println!("  {}", dim(&"─".repeat(48)));
    for (rank, entry) in report.leaderboard().into_iter().enumerate() {
        let name = if rank == 0 { entry.name.green().bold() } else { entry.name.normal() };
        println!("  {:<26} {:>10.4} {:>10.4}", name, entry.test_score, entry.train_score);
    }
    println!("  {}", dim(&"─".repeat(48)));
}
