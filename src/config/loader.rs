//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::env::{EnvResolver, Fallback};
use crate::config::schema::{BootstrapConfig, DialConfig, TransportConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

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

/// Load dial settings from a TOML file.
pub fn load_dial_config(path: &Path) -> Result<DialConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: DialConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Resolve transport tunables from the process environment.
///
/// Returns the tunables together with any that fell back to their
/// hardcoded value.
pub fn load_transport_config() -> (TransportConfig, Vec<Fallback>) {
    let mut resolver = EnvResolver::from_process_env();
    let transport = resolver.resolve();
    (transport, resolver.fallbacks().to_vec())
}

/// Combine dial settings with transport tunables and validate the result.
pub fn build_config(
    dial: DialConfig,
    transport: TransportConfig,
) -> Result<BootstrapConfig, ConfigError> {
    let config = BootstrapConfig { dial, transport };
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
