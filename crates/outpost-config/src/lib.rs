//! Outpost Config - layered configuration and the capture policy.
//!
//! Configuration is assembled from, lowest precedence first:
//!
//! 1. The embedded `defaults.toml`
//! 2. An optional TOML file supplied by the host application
//! 3. `OUTPOST_*` environment variables, applied only to fields the file
//!    did not set
//!
//! The merged tree is deserialized into [`Config`] and validated.
//!
//! [`RetentionPolicy`] is the runtime-mutable capture policy. Its configured
//! value only seeds a fresh store; afterwards the persisted copy wins.
//!
//! # Example
//!
//! ```rust
//! use outpost_config::Config;
//!
//! let config = Config::from_toml_str("[sync]\ninterval_secs = 10\n").unwrap();
//! assert_eq!(config.sync.interval_secs, 10);
//! assert_eq!(config.storage.cache_bound, 100);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod env;
mod error;
mod loader;
mod merge;
mod policy;
mod types;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use policy::RetentionPolicy;
pub use types::{
    Config, LoggingSection, RemoteSection, RetrySection, StorageBackend, StorageSection,
    SyncSection,
};

impl Config {
    /// Load configuration from embedded defaults, an optional file, and the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is unreadable or malformed, an
    /// environment variable cannot be coerced, or validation fails.
    pub fn load(path: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(path, &env::collect_env_vars())
    }

    /// Load configuration from defaults overlaid with a TOML string.
    /// The environment is not consulted.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the string is malformed or validation fails.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        loader::load_str(content, &std::collections::HashMap::new())
    }
}
