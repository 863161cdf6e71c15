//! mlproject - Main Entry Point

use clap::Parser;
use mlproject::cli::{execute, Cli};
use mlproject::logging::{init_logging, LoggingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Held until exit so the log file is flushed
    let _log_guard = init_logging(&LoggingConfig::default())?;

    if let Err(e) = execute(cli).await {
        tracing::error!(error = %e, "command failed");
        return Err(e);
    }
    Ok(())
}
