use std::fs;
use std::path::{Path, PathBuf};

use blackline_core::OracleFailurePolicy;
use blackline_ocr::TesseractConfig;
use blackline_oracle::OracleConfig;
use blackline_pdf::{OcrMode, DEFAULT_OCR_DPI};
use serde::{Deserialize, Serialize};

/// Environment variable that supplies the API key when the config has none.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub openai: OracleConfig,
    pub ocr: OcrSettings,
    pub resolver: ResolverSettings,
    #[serde(alias = "redact_images")]
    pub redact_images: bool,
    #[serde(alias = "write_reports")]
    pub write_reports: bool,
    #[serde(alias = "on_oracle_error")]
    pub on_oracle_error: OracleFailurePolicy,
    /// Directory holding the pdfium library, or the library file itself.
    #[serde(alias = "pdfium_path")]
    pub pdfium_path: Option<PathBuf>,
    /// Used when `RUST_LOG` is not set.
    #[serde(alias = "log_level")]
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai: OracleConfig::default(),
            ocr: OcrSettings::default(),
            resolver: ResolverSettings::default(),
            redact_images: true,
            write_reports: true,
            on_oracle_error: OracleFailurePolicy::default(),
            pdfium_path: None,
            log_level: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct OcrSettings {
    pub mode: OcrMode,
    pub dpi: u32,
    pub tesseract: TesseractConfig,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            mode: OcrMode::Auto,
            dpi: DEFAULT_OCR_DPI,
            tesseract: TesseractConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverSettings {
    #[serde(alias = "window_size")]
    pub window_size: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            window_size: blackline_core::resolver::DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no API key: set openai.apiKey in {0} or OPENAI_API_KEY")]
    MissingApiKey(String),
}

impl AppConfig {
    /// Reads and validates the config file. The API key falls back to
    /// `OPENAI_API_KEY` when the file leaves it empty.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: AppConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })?;

        let configured = config
            .openai
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        config.openai.api_key = configured.or_else(|| {
            std::env::var(API_KEY_ENV)
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
        });

        if config.openai.api_key.is_none() {
            return Err(ConfigError::MissingApiKey(path.display().to_string()));
        }
        Ok(config)
    }

    pub fn api_key(&self) -> &str {
        self.openai.api_key.as_deref().unwrap_or_default()
    }
}

/// Reads only `logLevel`, before logging is up. Any problem yields `None`;
/// the full load reports it later.
pub fn peek_log_level(path: &Path) -> Option<String> {
    peek_string(path, "logLevel", "log_level")
}

/// Reads only `pdfiumPath`; the library is bound once per run, before any
/// document loads its config.
pub fn peek_pdfium_path(path: &Path) -> Option<PathBuf> {
    peek_string(path, "pdfiumPath", "pdfium_path").map(PathBuf::from)
}

fn peek_string(path: &Path, key: &str, alias: &str) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    value
        .get(key)
        .or_else(|| value.get(alias))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_legacy_snake_case_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, r#"{"openai": {"api_key": "sk-test"}}"#);

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.api_key(), "sk-test");
        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.openai.vision_model, "gpt-4o-mini");
        assert_eq!(config.ocr.mode, OcrMode::Auto);
        assert_eq!(config.ocr.dpi, 400);
        assert_eq!(config.resolver.window_size, 10);
        assert!(config.redact_images);
        assert_eq!(config.on_oracle_error, OracleFailurePolicy::SkipPage);
    }

    #[test]
    fn test_camel_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"{
                "openai": {"apiKey": "k", "timeoutSecs": 30, "maxRetries": 0},
                "ocr": {"mode": "always", "dpi": 300, "tesseract": {"lang": "deu+eng"}},
                "resolver": {"windowSize": 6},
                "redactImages": false,
                "onOracleError": "abortDocument",
                "logLevel": "debug"
            }"#,
        );

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.openai.timeout_secs, 30);
        assert_eq!(config.openai.max_retries, 0);
        assert_eq!(config.ocr.mode, OcrMode::Always);
        assert_eq!(config.ocr.tesseract.lang_or_default(), "deu+eng");
        assert_eq!(config.resolver.window_size, 6);
        assert!(!config.redact_images);
        assert_eq!(config.on_oracle_error, OracleFailurePolicy::AbortDocument);
        assert_eq!(peek_log_level(&path).as_deref(), Some("debug"));
        assert_eq!(peek_pdfium_path(&path), None);
    }

    #[test]
    fn test_peek_pdfium_path_without_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, r#"{"pdfium_path": "/opt/pdfium/lib"}"#);
        assert_eq!(peek_pdfium_path(&path), Some(PathBuf::from("/opt/pdfium/lib")));
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppConfig::load(&dir.path().join("absent.json")),
            Err(ConfigError::Io { .. })
        ));

        let path = write(&dir, "{not json");
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Json { .. })));
        assert_eq!(peek_log_level(&path), None);
    }
}
