//! Event types for the Outpost event bus.

use chrono::{DateTime, Utc};
use outpost_core::{EventId, ResourceKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique notification identifier.
    pub event_id: Uuid,
    /// When the notification was created.
    pub timestamp: DateTime<Utc>,
    /// Groups notifications of one synchronization run.
    pub correlation_id: Option<Uuid>,
    /// Component that published it.
    pub source: String,
}

impl EventMetadata {
    /// Create new event metadata.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            correlation_id: None,
            source: source.into(),
        }
    }

    /// Set correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }
}

/// Everything the engine announces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutpostEvent {
    /// An event was accepted and stored.
    EventCaptured {
        /// Event metadata.
        metadata: EventMetadata,
        /// The queued item.
        event_id: EventId,
        /// `audit` or `operation`.
        kind: String,
        /// Category of the item.
        category: String,
    },

    /// The capture policy declined an event.
    CaptureRejected {
        /// Event metadata.
        metadata: EventMetadata,
        /// Category of the candidate.
        category: String,
        /// Action of the candidate.
        action: String,
        /// Which rule declined it.
        reason: String,
    },

    /// An event is queued in memory but the durable write failed.
    CaptureNotPersisted {
        /// Event metadata.
        metadata: EventMetadata,
        /// The queued item.
        event_id: EventId,
        /// Storage error text.
        error: String,
    },

    /// A synchronization run began.
    SyncStarted {
        /// Event metadata.
        metadata: EventMetadata,
        /// What triggered it.
        trigger: String,
        /// Items selected for delivery.
        pending: usize,
    },

    /// A synchronization run finished.
    SyncCompleted {
        /// Event metadata.
        metadata: EventMetadata,
        /// Items the remote accepted.
        synced: usize,
        /// Items that failed and will be retried.
        failed: usize,
        /// Items moved to the dead-letter state.
        dead_lettered: usize,
    },

    /// An item exhausted its retries.
    ItemDeadLettered {
        /// Event metadata.
        metadata: EventMetadata,
        /// The item.
        event_id: EventId,
        /// Last failure.
        reason: String,
    },

    /// Cached views of a resource are stale.
    ResourceInvalidated {
        /// Event metadata.
        metadata: EventMetadata,
        /// The resource that changed remotely.
        resource: ResourceKind,
    },

    /// Network reachability changed.
    ConnectivityChanged {
        /// Event metadata.
        metadata: EventMetadata,
        /// New state.
        online: bool,
    },

    /// The capture policy was replaced.
    PolicyUpdated {
        /// Event metadata.
        metadata: EventMetadata,
    },

    /// A reconciliation produced a new merged view.
    ReconciliationCompleted {
        /// Event metadata.
        metadata: EventMetadata,
        /// Remote items not present locally.
        remote_added: usize,
        /// Size of the merged view.
        total: usize,
    },

    /// A reconciliation failed; the previous view stands.
    ReconciliationFailed {
        /// Event metadata.
        metadata: EventMetadata,
        /// Error text.
        error: String,
    },
}

impl OutpostEvent {
    /// Snake-case name of the variant.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::EventCaptured { .. } => "event_captured",
            Self::CaptureRejected { .. } => "capture_rejected",
            Self::CaptureNotPersisted { .. } => "capture_not_persisted",
            Self::SyncStarted { .. } => "sync_started",
            Self::SyncCompleted { .. } => "sync_completed",
            Self::ItemDeadLettered { .. } => "item_dead_lettered",
            Self::ResourceInvalidated { .. } => "resource_invalidated",
            Self::ConnectivityChanged { .. } => "connectivity_changed",
            Self::PolicyUpdated { .. } => "policy_updated",
            Self::ReconciliationCompleted { .. } => "reconciliation_completed",
            Self::ReconciliationFailed { .. } => "reconciliation_failed",
        }
    }

    /// The event's metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::EventCaptured { metadata, .. }
            | Self::CaptureRejected { metadata, .. }
            | Self::CaptureNotPersisted { metadata, .. }
            | Self::SyncStarted { metadata, .. }
            | Self::SyncCompleted { metadata, .. }
            | Self::ItemDeadLettered { metadata, .. }
            | Self::ResourceInvalidated { metadata, .. }
            | Self::ConnectivityChanged { metadata, .. }
            | Self::PolicyUpdated { metadata }
            | Self::ReconciliationCompleted { metadata, .. }
            | Self::ReconciliationFailed { metadata, .. } => metadata,
        }
    }

    /// Mutable access to the metadata, for stamping correlation IDs.
    pub fn metadata_mut(&mut self) -> &mut EventMetadata {
        match self {
            Self::EventCaptured { metadata, .. }
            | Self::CaptureRejected { metadata, .. }
            | Self::CaptureNotPersisted { metadata, .. }
            | Self::SyncStarted { metadata, .. }
            | Self::SyncCompleted { metadata, .. }
            | Self::ItemDeadLettered { metadata, .. }
            | Self::ResourceInvalidated { metadata, .. }
            | Self::ConnectivityChanged { metadata, .. }
            | Self::PolicyUpdated { metadata }
            | Self::ReconciliationCompleted { metadata, .. }
            | Self::ReconciliationFailed { metadata, .. } => metadata,
        }
    }

    /// The invalidated resource, for `ResourceInvalidated`.
    #[must_use]
    pub fn resource(&self) -> Option<ResourceKind> {
        match self {
            Self::ResourceInvalidated { resource, .. } => Some(*resource),
            _ => None,
        }
    }
}
