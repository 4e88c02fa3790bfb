//! Configuration resolution for verdant-ai
//!
//! Turns the bootstrap [`TomlConfig`] plus environment into the explicit
//! settings each client is constructed with. Clients never read the process
//! environment themselves.

use std::path::{Path, PathBuf};
use std::time::Duration;
use verdant_common::config::{resolve_secret, TomlConfig};
use verdant_common::Result;

use crate::services::inference_client::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::services::{GeminiConfig, PipelineSettings};

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 5740;

/// Gemini key environment variables, highest priority first
pub const GEMINI_KEY_ENV_VARS: &[&str] = &["VERDANT_GEMINI_API_KEY", "GOOGLE_GEMINI_API_KEY"];

/// UploadThing secret environment variables, highest priority first
pub const STORAGE_KEY_ENV_VARS: &[&str] = &["VERDANT_UPLOADTHING_SECRET", "UPLOADTHING_SECRET"];

const DEFAULT_GEMINI_TIMEOUT_SECS: u64 = 60;

/// Resolved object store settings
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub api_key: String,
    pub api_base: Option<String>,
}

/// Gemini settings: key from environment or TOML, everything else from TOML
pub fn resolve_gemini_config(toml_config: &TomlConfig) -> Result<GeminiConfig> {
    let section = &toml_config.gemini;
    let api_key = resolve_secret(
        "Gemini API key",
        GEMINI_KEY_ENV_VARS,
        section.api_key.as_deref(),
    )?;

    Ok(GeminiConfig {
        api_key: Some(api_key),
        model: non_blank(section.model.as_deref()).unwrap_or(DEFAULT_MODEL).to_string(),
        api_base: non_blank(section.api_base.as_deref())
            .unwrap_or(DEFAULT_API_BASE)
            .to_string(),
        request_timeout: Duration::from_secs(
            section
                .request_timeout_secs
                .unwrap_or(DEFAULT_GEMINI_TIMEOUT_SECS),
        ),
    })
}

/// UploadThing settings
pub fn resolve_storage_settings(toml_config: &TomlConfig) -> Result<StorageSettings> {
    let section = &toml_config.storage;
    let api_key = resolve_secret(
        "UploadThing secret",
        STORAGE_KEY_ENV_VARS,
        section.api_key.as_deref(),
    )?;

    Ok(StorageSettings {
        api_key,
        api_base: non_blank(section.api_base.as_deref()).map(str::to_string),
    })
}

pub fn pipeline_settings(toml_config: &TomlConfig) -> PipelineSettings {
    let section = &toml_config.pipeline;
    PipelineSettings {
        catalog_sample_size: section.catalog_sample_size,
        inference_timeout: Duration::from_secs(section.inference_timeout_secs),
    }
}

pub fn fetch_timeout(toml_config: &TomlConfig) -> Duration {
    Duration::from_secs(toml_config.pipeline.fetch_timeout_secs)
}

/// Database file: CLI → TOML `database_path` → `<root>/verdant.db`
pub fn resolve_database_path(
    cli_arg: Option<&Path>,
    root_folder: &Path,
    toml_config: &TomlConfig,
) -> PathBuf {
    cli_arg
        .map(Path::to_path_buf)
        .or_else(|| toml_config.database_path.clone())
        .unwrap_or_else(|| root_folder.join("verdant.db"))
}

/// Listen port: CLI → TOML → default
pub fn resolve_port(cli_arg: Option<u16>, toml_config: &TomlConfig) -> u16 {
    cli_arg.or(toml_config.port).unwrap_or(DEFAULT_PORT)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
