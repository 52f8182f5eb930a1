//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::schema::{RouterConfig, Schema};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format for {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// File formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Format::Toml),
            Some("json") => Ok(Format::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

pub fn parse<T: DeserializeOwned>(content: &str, format: Format) -> Result<T, ConfigError> {
    Ok(match format {
        Format::Toml => toml::from_str(content)?,
        Format::Json => serde_json::from_str(content)?,
    })
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate router configuration from a TOML or JSON file.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let format = Format::from_path(path)?;
    let content = read(path)?;
    let config: RouterConfig = parse(&content, format)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load a route schema from a TOML or JSON file.
pub fn load_schema(path: &Path) -> Result<Schema, ConfigError> {
    let format = Format::from_path(path)?;
    let content = read(path)?;
    parse(&content, format)
}
