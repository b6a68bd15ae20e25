//! Outpost Storage - durable key-value layer under the local queue.
//!
//! The queue persists its whole state as one serialized blob under a fixed
//! namespace. This crate supplies the byte store it writes through:
//!
//! - [`MemoryKvStore`]: ephemeral, for tests and previews
//! - [`SurrealKvStore`] (behind the **`kv`** feature, on by default):
//!   embedded, ACID-compliant `SurrealKV` tree. A `set` returns only after
//!   the transaction commits.
//!
//! [`ScopedKvStore`] binds a namespace and adds typed JSON helpers.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore, ScopedKvStore};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;
