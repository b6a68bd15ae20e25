//! Layered loading: defaults, then file, then env fallbacks.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::env::apply_env_fallbacks;
use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

pub(crate) fn load(path: Option<&Path>, env_vars: &HashMap<String, String>) -> ConfigResult<Config> {
    let file_layer = match path {
        Some(path) => try_load_file(path)?,
        None => None,
    };
    assemble(file_layer, env_vars)
}

pub(crate) fn load_str(content: &str, env_vars: &HashMap<String, String>) -> ConfigResult<Config> {
    let overlay = parse(content, "<inline config>")?;
    assemble(Some(overlay), env_vars)
}

fn assemble(
    file_layer: Option<toml::Value>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<Config> {
    let mut merged = parse(DEFAULTS_TOML, "<embedded defaults>")?;

    if let Some(overlay) = &file_layer {
        deep_merge(&mut merged, overlay);
    }

    let env_count = apply_env_fallbacks(&mut merged, file_layer.as_ref(), env_vars)?;
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;
    Ok(config)
}

fn parse(content: &str, origin: &str) -> ConfigResult<toml::Value> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: origin.to_owned(),
        source: e,
    })
}

/// Read a config file, returning `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::invalid(
            &path.display().to_string(),
            format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        ));
    }

    let value = parse(&content, &path.display().to_string())?;
    info!(path = %path.display(), "loaded config file");
    Ok(Some(value))
}
