//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use outpost_core::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::policy::RetentionPolicy;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote API settings.
    pub remote: RemoteSection,
    /// Synchronization settings.
    pub sync: SyncSection,
    /// Local store settings.
    pub storage: StorageSection,
    /// Initial capture policy for a fresh store.
    pub policy: RetentionPolicy,
    /// Logging settings.
    pub logging: LoggingSection,
}

/// Remote API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    /// Base URL; endpoint paths are appended to it.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub api_token: Option<String>,
    /// Per-request deadline in seconds.
    pub timeout_secs: u64,
    /// Page size for reconciliation reads.
    pub history_limit: usize,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/api".to_owned(),
            api_token: None,
            timeout_secs: 30,
            history_limit: 100,
        }
    }
}

impl RemoteSection {
    /// Per-request deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Synchronization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Periodic tick while online, in seconds.
    pub interval_secs: u64,
    /// Kick a run right after each successful capture while online.
    pub sync_on_capture: bool,
    /// Backoff and dead-letter settings.
    pub retry: RetrySection,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            sync_on_capture: true,
            retry: RetrySection::default(),
        }
    }
}

impl SyncSection {
    /// Periodic tick.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Backoff and dead-letter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Attempts before dead-lettering (0 = retry forever).
    pub max_attempts: u32,
    /// Delay after the first failure, in milliseconds.
    pub initial_delay_ms: u64,
    /// Cap on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor between delays.
    pub exponential_base: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 30_000,
            max_delay_ms: 1_800_000,
            exponential_base: 2.0,
        }
    }
}

impl RetrySection {
    /// Convert to the engine's retry policy.
    #[must_use]
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.exponential_base,
        )
    }
}

/// Which key-value backend holds the local store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Embedded `SurrealKV` tree on disk.
    #[default]
    SurrealKv,
    /// Process memory only; nothing survives a restart.
    Memory,
}

/// Local store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Backend selection.
    pub backend: StorageBackend,
    /// Data directory; the platform data dir when unset.
    pub directory: Option<PathBuf>,
    /// Namespace holding the persisted blob.
    pub namespace: String,
    /// Maximum number of cached events.
    pub cache_bound: usize,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::SurrealKv,
            directory: None,
            namespace: "outpost:local".to_owned(),
            cache_bound: 100,
        }
    }
}

impl StorageSection {
    /// The configured directory, or the platform data directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoDataDir`] if no directory is configured and
    /// the platform has none.
    pub fn resolve_directory(&self) -> ConfigResult<PathBuf> {
        if let Some(dir) = &self.directory {
            return Ok(dir.clone());
        }
        directories::ProjectDirs::from("", "", "outpost")
            .map(|dirs| dirs.data_dir().join("queue"))
            .ok_or(ConfigError::NoDataDir)
    }
}

/// Logging settings, consumed by `outpost-telemetry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level filter.
    pub level: String,
    /// One of `pretty`, `compact`, `json`, `full`.
    pub format: String,
    /// Extra filter directives, e.g. `outpost_sync=debug`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
        }
    }
}
