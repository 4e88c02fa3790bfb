//! Bootstrap configuration loading and root folder resolution
//!
//! Configuration sources, highest priority first:
//! 1. Command-line arguments (handled by each binary)
//! 2. Environment variables
//! 3. TOML config file
//! 4. Built-in defaults
//!
//! A missing TOML file is not an error: services start with defaults and
//! warn about it once logging is up. Credentials have no default; callers
//! decide whether their absence is fatal.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable overriding the data root folder
pub const ROOT_FOLDER_ENV: &str = "VERDANT_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data root folder (database lives here unless `database_path` is set)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP listen port
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub gemini: GeminiSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub pipeline: PipelineSection,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or full `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// `[gemini]` section: inference provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiSection {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    /// Per-request HTTP timeout for the provider API
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// `[storage]` section: upload object store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

/// `[pipeline]` section: analysis pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Number of catalog product names offered to the model
    #[serde(default = "default_catalog_sample_size")]
    pub catalog_sample_size: u32,

    /// Upper bound for one inference call
    #[serde(default = "default_inference_timeout_secs")]
    pub inference_timeout_secs: u64,

    /// Upper bound for downloading the uploaded image
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            catalog_sample_size: default_catalog_sample_size(),
            inference_timeout_secs: default_inference_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_catalog_sample_size() -> u32 {
    50
}

fn default_inference_timeout_secs() -> u64 {
    60
}

fn default_fetch_timeout_secs() -> u64 {
    20
}

/// Default TOML location for a module: `<config_dir>/verdant/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("verdant").join(format!("{}.toml", module_name)))
}

/// Load TOML configuration, falling back to defaults when the file is missing
///
/// Runs before logging is configured (the log level lives in this file), so a
/// missing file is reported by the caller once its subscriber is installed.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve the data root folder
///
/// Priority: CLI argument → `VERDANT_ROOT_FOLDER` → TOML → OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("verdant"))
        .unwrap_or_else(|| PathBuf::from("./verdant_data"))
}

/// Resolve a credential from environment variables, then TOML
///
/// Environment variables are checked in order. Blank values are ignored.
/// When more than one source holds a value, the first one wins and a warning
/// is logged.
pub fn resolve_secret(
    label: &str,
    env_vars: &[&str],
    toml_value: Option<&str>,
) -> Result<String> {
    let mut found: Vec<(String, String)> = Vec::new();

    for var in env_vars {
        if let Ok(value) = std::env::var(var) {
            if is_valid_key(&value) {
                found.push((format!("environment ({})", var), value));
            }
        }
    }

    if let Some(value) = toml_value {
        if is_valid_key(value) {
            found.push(("TOML".to_string(), value.to_string()));
        }
    }

    if found.len() > 1 {
        let sources: Vec<&str> = found.iter().map(|(source, _)| source.as_str()).collect();
        warn!(
            "{} found in multiple sources: {}. Using {}.",
            label,
            sources.join(", "),
            sources[0]
        );
    }

    match found.into_iter().next() {
        Some((source, value)) => {
            info!("{} loaded from {}", label, source);
            Ok(value.trim().to_string())
        }
        None => Err(Error::Config(format!(
            "{} not configured. Set one of [{}] or add it to the TOML config file",
            label,
            env_vars.join(", ")
        ))),
    }
}

/// Validate credential value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
