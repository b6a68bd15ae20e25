//! Post-merge configuration validation.
//!
//! [`validate_policy`] is also the gate for runtime policy updates.

use crate::error::{ConfigError, ConfigResult};
use crate::policy::RetentionPolicy;
use crate::types::Config;

/// Upper bound on `policy.retention_days` (ten years).
pub const MAX_RETENTION_DAYS: i32 = 3650;

/// Upper bound on `storage.cache_bound`.
pub const MAX_CACHE_BOUND: usize = 10_000;

/// Upper bound on `remote.history_limit`.
pub const MAX_HISTORY_LIMIT: usize = 1000;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_remote(config)?;
    validate_sync(config)?;
    validate_storage(config)?;
    validate_logging(config)?;
    validate_policy(&config.policy).map_err(|e| match e {
        ConfigError::ValidationError { field, message } => ConfigError::ValidationError {
            field: format!("policy.{field}"),
            message,
        },
        other => other,
    })
}

/// Validate a capture policy.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] naming the offending field.
pub fn validate_policy(policy: &RetentionPolicy) -> ConfigResult<()> {
    if !(1..=MAX_RETENTION_DAYS).contains(&policy.retention_days) {
        return Err(ConfigError::invalid(
            "retention_days",
            format!(
                "retention_days {} is out of range; must be between 1 and {MAX_RETENTION_DAYS}",
                policy.retention_days
            ),
        ));
    }
    if policy.excluded_modules.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::invalid(
            "excluded_modules",
            "module names must not be blank",
        ));
    }
    if policy.excluded_actions.iter().any(|a| a.trim().is_empty()) {
        return Err(ConfigError::invalid(
            "excluded_actions",
            "action names must not be blank",
        ));
    }
    Ok(())
}

fn validate_remote(config: &Config) -> ConfigResult<()> {
    let r = &config.remote;

    let parsed = url::Url::parse(&r.base_url).map_err(|e| {
        ConfigError::invalid("remote.base_url", format!("'{}' is not a URL: {e}", r.base_url))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            "remote.base_url",
            format!("unsupported scheme '{}'; expected http or https", parsed.scheme()),
        ));
    }

    if !(1..=600).contains(&r.timeout_secs) {
        return Err(ConfigError::invalid(
            "remote.timeout_secs",
            "timeout_secs must be between 1 and 600",
        ));
    }

    if !(1..=MAX_HISTORY_LIMIT).contains(&r.history_limit) {
        return Err(ConfigError::invalid(
            "remote.history_limit",
            format!("history_limit must be between 1 and {MAX_HISTORY_LIMIT}"),
        ));
    }

    Ok(())
}

fn validate_sync(config: &Config) -> ConfigResult<()> {
    let s = &config.sync;

    if s.interval_secs == 0 {
        return Err(ConfigError::invalid(
            "sync.interval_secs",
            "interval_secs must be at least 1",
        ));
    }

    if !s.retry.exponential_base.is_finite() || s.retry.exponential_base < 1.0 {
        return Err(ConfigError::invalid(
            "sync.retry.exponential_base",
            "exponential_base must be a finite number >= 1.0",
        ));
    }

    if s.retry.initial_delay_ms > s.retry.max_delay_ms {
        return Err(ConfigError::invalid(
            "sync.retry.initial_delay_ms",
            "initial_delay_ms must not exceed max_delay_ms",
        ));
    }

    Ok(())
}

fn validate_storage(config: &Config) -> ConfigResult<()> {
    let s = &config.storage;

    if !(1..=MAX_CACHE_BOUND).contains(&s.cache_bound) {
        return Err(ConfigError::invalid(
            "storage.cache_bound",
            format!("cache_bound must be between 1 and {MAX_CACHE_BOUND}"),
        ));
    }

    if s.namespace.is_empty() || s.namespace.contains('\0') {
        return Err(ConfigError::invalid(
            "storage.namespace",
            "namespace must be non-empty and must not contain null bytes",
        ));
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if !matches!(
        l.level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    ) {
        return Err(ConfigError::invalid(
            "logging.level",
            format!("unknown level '{}'", l.level),
        ));
    }

    if !matches!(l.format.as_str(), "pretty" | "compact" | "json" | "full") {
        return Err(ConfigError::invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: pretty, compact, json, full",
                l.format
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: ConfigError) -> String {
        match err {
            ConfigError::ValidationError { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        validate(&Config::default()).unwrap();
    }

    #[test]
    fn test_negative_retention_rejected() {
        let policy = RetentionPolicy {
            retention_days: -30,
            ..RetentionPolicy::default()
        };
        assert_eq!(field_of(validate_policy(&policy).unwrap_err()), "retention_days");

        let config = Config {
            policy,
            ..Config::default()
        };
        assert_eq!(field_of(validate(&config).unwrap_err()), "policy.retention_days");
    }

    #[test]
    fn test_blank_exclusion_rejected() {
        let policy = RetentionPolicy::default().excluding_action("  ");
        assert_eq!(field_of(validate_policy(&policy).unwrap_err()), "excluded_actions");
    }

    #[test]
    fn test_remote_url_rules() {
        let mut config = Config::default();
        config.remote.base_url = "ftp://files".to_owned();
        assert_eq!(field_of(validate(&config).unwrap_err()), "remote.base_url");
        config.remote.base_url = "not a url".to_owned();
        assert_eq!(field_of(validate(&config).unwrap_err()), "remote.base_url");
    }

    #[test]
    fn test_bounds() {
        let mut config = Config::default();
        config.storage.cache_bound = 0;
        assert_eq!(field_of(validate(&config).unwrap_err()), "storage.cache_bound");

        let mut config = Config::default();
        config.sync.interval_secs = 0;
        assert_eq!(field_of(validate(&config).unwrap_err()), "sync.interval_secs");

        let mut config = Config::default();
        config.sync.retry.initial_delay_ms = 10;
        config.sync.retry.max_delay_ms = 5;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "sync.retry.initial_delay_ms"
        );

        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config).unwrap_err()), "logging.format");
    }
}
