//! Process-wide log sink: stderr plus a timestamped file per run.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LEVEL: &str = "info";

/// `redact_<YYYYMMDD_HHMMSS>.log` inside `dir`.
pub fn log_file_path(dir: &Path, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    dir.join(format!("redact_{}.log", now.format("%Y%m%d_%H%M%S")))
}

/// Installs the subscriber. `RUST_LOG` wins over `level`. `log` records from
/// the library crates are forwarded through the subscriber's log bridge.
/// Returns the path of the log file.
pub fn init(dir: &Path, level: Option<&str>) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = log_file_path(dir, chrono::Local::now());
    let file = File::create(&path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or(DEFAULT_LEVEL)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr.and(Mutex::new(file)))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {}", e))?;

    Ok(path)
}
