//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{ElaborationConfig, TesselConfig};
use std::path::Path;

/// Loads the elaboration settings from `<project_dir>/tessel.toml`.
pub fn load_config(project_dir: &Path) -> Result<ElaborationConfig, ConfigError> {
    let config_path = project_dir.join("tessel.toml");
    let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
        path: config_path.clone(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates elaboration settings from a TOML string.
///
/// Missing tables and keys fall back to [`ElaborationConfig::default`].
pub fn load_config_from_str(content: &str) -> Result<ElaborationConfig, ConfigError> {
    let config: TesselConfig = toml::from_str(content)?;
    validate_config(&config.elaboration)?;
    Ok(config.elaboration)
}

fn validate_config(config: &ElaborationConfig) -> Result<(), ConfigError> {
    let prefix = &config.name_prefix;
    let reason = if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        "may only contain ASCII letters, digits and `_`"
    } else if prefix.starts_with(|c: char| c.is_ascii_digit()) {
        "must not start with a digit"
    } else {
        return Ok(());
    };
    Err(ConfigError::BadPrefix {
        prefix: prefix.clone(),
        reason,
    })
}
