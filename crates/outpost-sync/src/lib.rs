//! Outpost Sync - moves queued events to the remote and reads history back.
//!
//! - [`SyncEngine`]: single-flight drain of the local queue, oldest first,
//!   with per-item failure isolation and bounded backoff
//! - [`spawn_sync_loop`]: drives the engine from a timer, connectivity
//!   transitions and capture kicks
//! - [`RemoteApi`] / [`HttpRemote`]: the remote boundary
//! - [`Reconciler`]: merges remote history with the local cache into a
//!   read-only view; the cache itself is never written

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod connectivity;
mod engine;
mod error;
mod http;
mod reconcile;
mod remote;
mod severity;

pub use connectivity::Connectivity;
pub use engine::{SyncEngine, SyncOutcome, SyncReport, SyncTrigger, spawn_sync_loop};
pub use error::{RemoteError, SyncError, SyncResult};
pub use http::HttpRemote;
pub use reconcile::{MergedView, Reconciler, merge_events};
pub use remote::{DEFAULT_HISTORY_LIMIT, HistoryQuery, RemoteApi, RemoteRecord};
pub use severity::infer_severity;
