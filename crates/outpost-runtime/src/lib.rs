//! Outpost Runtime - the assembled local-first event service.
//!
//! [`Outpost`] owns one instance of every component: the durable store,
//! the capture recorder, the sync engine and its background loop, the
//! reconciler and the event bus. Hosts create it explicitly, pass it
//! where needed and shut it down when done.
//!
//! # Example
//!
//! ```rust,no_run
//! use outpost_config::Config;
//! use outpost_core::prelude::*;
//! use outpost_runtime::Outpost;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let outpost = Outpost::open(Config::load(None)?).await?;
//!
//! outpost
//!     .capture_audit(
//!         AuditRecord::new("u-17", "Dana", "invoices", "void")
//!             .with_severity(Severity::Warning)
//!             .with_target("invoice", "INV-204", "INV-204"),
//!     )
//!     .await;
//!
//! outpost.set_online(true);
//! outpost.sync_now().await;
//! outpost.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod service;

pub use error::{RuntimeError, RuntimeResult};
pub use service::{Outpost, OutpostStatus};
