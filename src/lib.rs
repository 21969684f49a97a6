//! Blackline: LLM-guided PDF redaction over a folder of documents.

pub mod batch;
pub mod config;
pub mod logging;

pub use batch::{run_batch, BatchPaths, BatchResult, RunInputs};
pub use config::{AppConfig, ConfigError};
