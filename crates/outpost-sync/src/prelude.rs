//! Prelude module - commonly used types for convenient import.

pub use crate::{
    Connectivity, HistoryQuery, HttpRemote, MergedView, Reconciler, RemoteApi, RemoteError,
    SyncEngine, SyncError, SyncOutcome, SyncReport, SyncResult, SyncTrigger,
};
