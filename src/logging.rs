//! Logging setup
//!
//! Logging is configured once by the process entry point. Events go to the
//! console and to a timestamped file under the log directory; the returned
//! [`LogGuard`] flushes the file when the process winds down.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{MlError, Result};

const DEFAULT_FILTER: &str = "mlproject=info,tower_http=info";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    /// Used when `RUST_LOG` is not set
    pub default_filter: String,
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            default_filter: DEFAULT_FILTER.to_string(),
            console: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }
}

#[derive(Clone)]
struct SharedFile(Arc<Mutex<File>>);

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().flush()
    }
}

/// Keeps the log file open; flushes it on drop.
#[must_use = "dropping the guard tears logging down"]
pub struct LogGuard {
    file: SharedFile,
    path: PathBuf,
}

impl LogGuard {
    pub fn log_path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "Closing log file");
        let _ = self.file.flush();
        let _ = self.file.0.lock().sync_all();
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    fs::create_dir_all(&config.log_dir)?;
    let file_name = format!("{}.log", chrono::Local::now().format("%m_%d_%Y_%H_%M_%S"));
    let path = config.log_dir.join(file_name);
    let file = SharedFile(Arc::new(Mutex::new(File::create(&path)?)));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let writer = file.clone();
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_writer(move || writer.clone());

    let console_layer = config.console.then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| MlError::ConfigError(format!("logging already initialized: {}", e)))?;

    tracing::info!(path = %path.display(), "Logging initialized");
    Ok(LogGuard { file, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert!(config.console);
        assert!(config.default_filter.starts_with("mlproject="));
    }

    #[test]
    fn test_init_writes_file_and_rejects_second_init() {
        let dir = tempdir().unwrap();
        let config = LoggingConfig::default()
            .with_log_dir(dir.path().join("logs"))
            .with_console(false);

        let guard = init_logging(&config).unwrap();
        assert!(guard.log_path().exists());
        assert_eq!(guard.log_path().extension().and_then(|e| e.to_str()), Some("log"));

        assert!(init_logging(&config).is_err());
        drop(guard);
    }
}
