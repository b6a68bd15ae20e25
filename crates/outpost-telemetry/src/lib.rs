//! Outpost Telemetry - logging setup for host applications.
//!
//! Outpost is an embedded library and never installs a global subscriber on
//! its own. Hosts call [`setup_logging`] once at startup.
//!
//! # Example
//!
//! ```rust,no_run
//! use outpost_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_directive("outpost_sync=debug");
//! let _guard = setup_logging(&config).unwrap();
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
