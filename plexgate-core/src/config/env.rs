//! Environment variable interpolation for configuration
//!
//! Credentials never live in config files directly: a `${VAR_NAME}`
//! placeholder is replaced by the named environment variable at load time,
//! so a committed config carries references, not tokens.

use super::error::ConfigError;
use super::schema::GatewayConfig;
use super::secrets::SecretString;
use regex::Regex;
use std::env;

fn placeholder_pattern() -> Regex {
    // Compile-time-constant pattern; cannot fail.
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid placeholder regex")
}

/// Interpolate environment variables in a configuration string
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let pattern = placeholder_pattern();
    let mut result = content.to_string();
    let mut missing_vars = Vec::new();

    for cap in pattern.captures_iter(content) {
        let full_match = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
        let var_name = &cap[1];

        match env::var(var_name) {
            Ok(value) => {
                result = result.replace(full_match, &value);
            }
            Err(_) => {
                missing_vars.push(var_name.to_string());
            }
        }
    }

    // Report the first missing variable (to match the error type)
    if let Some(var) = missing_vars.first() {
        return Err(ConfigError::EnvVarNotFound { var: var.clone() });
    }

    Ok(result)
}

/// Interpolate any placeholders remaining inside a loaded config. Targets
/// only the fields that may carry them: cookie values and the base URL.
pub fn interpolate_config_env_vars(config: &mut GatewayConfig) -> Result<(), ConfigError> {
    let pattern = placeholder_pattern();

    for value in config.session.cookies.values_mut() {
        let raw = value.expose_secret();
        if pattern.is_match(raw) {
            let interpolated = interpolate_single_value(raw, &pattern)?;
            *value = SecretString::new(interpolated);
        }
    }

    if pattern.is_match(&config.engine.base_url) {
        config.engine.base_url = interpolate_single_value(&config.engine.base_url, &pattern)?;
    }

    Ok(())
}

fn interpolate_single_value(value: &str, pattern: &Regex) -> Result<String, ConfigError> {
    if let Some(cap) = pattern.captures(value) {
        let var_name = &cap[1];
        match env::var(var_name) {
            Ok(env_value) => Ok(value.replace(&cap[0], &env_value)),
            Err(_) => Err(ConfigError::EnvVarNotFound {
                var: var_name.to_string(),
            }),
        }
    } else {
        Ok(value.to_string())
    }
}
