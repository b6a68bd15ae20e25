//! Prelude module - commonly used types for convenient import.

pub use crate::{
    CaptureOutcome, LocalStore, QueueError, QueueMeta, QueueResult, Recorder, RejectReason,
    should_capture,
};
