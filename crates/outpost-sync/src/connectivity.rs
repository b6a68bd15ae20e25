//! Online/offline state shared by the engine and its drivers.

use std::sync::Arc;

use outpost_events::{EventBus, EventMetadata, OutpostEvent};
use tokio::sync::watch;
use tracing::info;

/// Network reachability flag with change notification.
///
/// The host application reports transitions; the sync loop reacts to the
/// offline → online edge.
#[derive(Debug, Clone)]
pub struct Connectivity {
    state: Arc<watch::Sender<bool>>,
    bus: EventBus,
}

impl Connectivity {
    /// Start in the given state.
    #[must_use]
    pub fn new(online: bool, bus: EventBus) -> Self {
        let (state, _) = watch::channel(online);
        Self {
            state: Arc::new(state),
            bus,
        }
    }

    /// Record the current reachability. Returns `true` if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "Connectivity changed");
            self.bus.publish(OutpostEvent::ConnectivityChanged {
                metadata: EventMetadata::new("connectivity"),
                online,
            });
        }
        changed
    }

    /// Current reachability.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Watch for transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}
