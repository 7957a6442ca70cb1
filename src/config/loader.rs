//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{LogFormat, ProxyConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the listening port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable holding the shared secret.
pub const PASSWORD_ENV: &str = "PASSWORD";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid {var}: {message}")]
    Env { var: &'static str, message: String },
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

/// Command-line values that take precedence over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
    }
}

/// Parse configuration from a TOML file. The result is not validated yet:
/// later sources may still override invalid values.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Build the startup configuration: defaults, then the optional file, then
/// `PORT` / `PASSWORD` from the process environment, then `overrides`.
/// Validation runs once on the merged result.
pub fn load_startup_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ProxyConfig, ConfigError> {
    let config = match path {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    resolve_config(config, |var| std::env::var(var).ok(), overrides)
}

/// Layer environment values and `overrides` onto `config`, then validate.
pub fn resolve_config<F>(
    mut config: ProxyConfig,
    lookup: F,
    overrides: &ConfigOverrides,
) -> Result<ProxyConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env(&mut config, lookup)?;
    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment values onto `config`. Unset or empty variables leave
/// the current value alone.
pub fn apply_env<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup(PORT_ENV).filter(|v| !v.trim().is_empty()) {
        config.listener.port = port.trim().parse().map_err(|e| ConfigError::Env {
            var: PORT_ENV,
            message: format!("{port:?}: {e}"),
        })?;
    }
    if let Some(password) = lookup(PASSWORD_ENV).filter(|v| !v.is_empty()) {
        config.auth.password = password;
    }
    Ok(())
}
