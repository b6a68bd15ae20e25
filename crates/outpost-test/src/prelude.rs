//! Prelude module - commonly used test utilities.
//!
//! Use `use outpost_test::prelude::*;` in test modules.

pub use crate::fixtures::{
    remote_event, test_audit, test_audit_at, test_audit_for, test_create, test_delete,
};
pub use crate::harness::init_test_logging;
pub use crate::mocks::{FailingKvStore, MockRemote, RemoteCall};
