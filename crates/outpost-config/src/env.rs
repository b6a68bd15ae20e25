//! Environment variable fallbacks.
//!
//! Env vars are **fallback**, not override: a mapping is applied only when
//! the config file did not set the field.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{has_path, set_path};

/// Expected TOML type of a mapped field.
#[derive(Clone, Copy)]
enum Kind {
    Str,
    Int,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: Kind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "OUTPOST_REMOTE_URL",
        field_path: "remote.base_url",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "OUTPOST_REMOTE_TOKEN",
        field_path: "remote.api_token",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "OUTPOST_SYNC_INTERVAL_SECS",
        field_path: "sync.interval_secs",
        kind: Kind::Int,
    },
    EnvMapping {
        var_name: "OUTPOST_STORAGE_DIR",
        field_path: "storage.directory",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "OUTPOST_CACHE_BOUND",
        field_path: "storage.cache_bound",
        kind: Kind::Int,
    },
    EnvMapping {
        var_name: "OUTPOST_LOG_LEVEL",
        field_path: "logging.level",
        kind: Kind::Str,
    },
];

/// Snapshot the `OUTPOST_*` variables of the current process.
pub(crate) fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("OUTPOST_"))
        .collect()
}

/// Apply env fallbacks to `merged` for every field absent from `file_layer`.
///
/// Returns the number of variables applied.
pub(crate) fn apply_env_fallbacks(
    merged: &mut toml::Value,
    file_layer: Option<&toml::Value>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if file_layer.is_some_and(|layer| has_path(layer, mapping.field_path)) {
            continue;
        }
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };

        let value = match mapping.kind {
            Kind::Str => toml::Value::String(raw.clone()),
            Kind::Int => raw
                .trim()
                .parse::<i64>()
                .map(toml::Value::Integer)
                .map_err(|e| ConfigError::EnvError {
                    var_name: mapping.var_name.to_owned(),
                    message: format!("expected an integer: {e}"),
                })?,
        };

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        set_path(merged, mapping.field_path, value);
        count = count.saturating_add(1);
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_env_applies_when_file_silent() {
        let mut merged: toml::Value = toml::from_str("[sync]\ninterval_secs = 30\n").unwrap();
        let applied = apply_env_fallbacks(
            &mut merged,
            None,
            &env(&[("OUTPOST_SYNC_INTERVAL_SECS", "7")]),
        )
        .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(merged["sync"]["interval_secs"].as_integer(), Some(7));
    }

    #[test]
    fn test_file_beats_env() {
        let file: toml::Value = toml::from_str("[remote]\nbase_url = \"https://file\"\n").unwrap();
        let mut merged = file.clone();
        apply_env_fallbacks(
            &mut merged,
            Some(&file),
            &env(&[("OUTPOST_REMOTE_URL", "https://env")]),
        )
        .unwrap();
        assert_eq!(merged["remote"]["base_url"].as_str(), Some("https://file"));
    }

    #[test]
    fn test_bad_integer_is_env_error() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let err = apply_env_fallbacks(
            &mut merged,
            None,
            &env(&[("OUTPOST_CACHE_BOUND", "lots")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EnvError { .. }));
    }
}
