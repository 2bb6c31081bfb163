//! Configuration loading from disk and command-line flags.
//!
//! Precedence, lowest to highest: built-in defaults, the TOML file, flags.

use std::fs;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use thiserror::Error;

use crate::config::cli::Cli;
use crate::config::schema::{EchoConfig, ResponseConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::echo::params::ParamError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error("failed to read body file {path}: {source}")]
    BodyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid response settings: {0}")]
    Settings(#[source] ParamError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML config file without validating it.
pub fn load_config(path: &Path) -> Result<EchoConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Build the effective configuration: defaults, then the file named by
/// `--config` (if any), then flags. The result is validated.
pub fn load(cli: &Cli) -> Result<EchoConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EchoConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Read the configured body file, if one is set.
pub fn load_body(response: &ResponseConfig) -> Result<Option<Bytes>, ConfigError> {
    let Some(path) = &response.body_file else {
        return Ok(None);
    };
    let bytes = fs::read(path).map_err(|source| ConfigError::BodyFile {
        path: PathBuf::from(path),
        source,
    })?;
    tracing::debug!(path = %path, bytes = bytes.len(), "Loaded response body file");
    Ok(Some(Bytes::from(bytes)))
}
