//! Outpost Queue - the local half of the local-first event queue.
//!
//! - [`policy`]: pure capture decision, re-evaluated on every capture
//! - [`LocalStore`]: bounded, newest-first collection persisted whole as a
//!   single blob together with the capture policy and queue metadata
//! - [`Recorder`]: the capture API; resolves every call to a
//!   [`CaptureOutcome`] and never surfaces an error to the caller

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod policy;
pub mod prelude;

mod capture;
mod error;
mod store;

#[cfg(test)]
mod test_support;

pub use capture::{CaptureError, CaptureOutcome, Recorder};
pub use error::{QueueError, QueueResult};
pub use policy::{RejectReason, should_capture};
pub use store::{DEFAULT_CACHE_BOUND, LocalStore, PersistedState, QueueMeta, STATE_KEY};
