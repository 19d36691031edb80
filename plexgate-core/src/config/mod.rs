//! Configuration module for the gateway
//!
//! Loads and validates gateway configuration from YAML or JSON, with
//! `${ENV_VAR}` interpolation for injected secrets. Session credentials
//! exist only as configuration supplied at load time - never as literals
//! in source.

mod env;
mod error;
mod schema;
mod secrets;

pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{ConnectionConfig, EngineConfig, GatewayConfig, SessionConfig};
pub use secrets::SecretString;

use std::fs;
use std::path::Path;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<GatewayConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;

    // Interpolate environment variables before parsing
    let interpolated = env::interpolate_env_vars(&content)?;

    let mut config: GatewayConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    // Additional interpolation for any remaining env vars
    env::interpolate_config_env_vars(&mut config)?;

    config.validate()?;
    Ok(config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<GatewayConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;

    // Interpolate environment variables before parsing
    let interpolated = env::interpolate_env_vars(&content)?;

    let mut config: GatewayConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    // Additional interpolation for any remaining env vars
    env::interpolate_config_env_vars(&mut config)?;

    config.validate()?;
    Ok(config)
}
