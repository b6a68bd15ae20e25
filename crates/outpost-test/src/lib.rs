//! Outpost Test - Shared test utilities.
//!
//! Mock implementations of the remote and storage boundaries plus fixtures
//! for audit records and deferred operations. Use as a dev-dependency.
//!
//! ```rust,ignore
//! use outpost_test::{MockRemote, test_audit};
//!
//! let remote = MockRemote::new();
//! remote.fail_with(id, RemoteError::Timeout);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
