//! Event bus for broadcasting events to subscribers.

use std::sync::Arc;

use outpost_core::ResourceKind;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::event::OutpostEvent;
use crate::subscriber::SubscriberRegistry;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Broadcasts [`OutpostEvent`]s to async receivers and synchronous
/// subscribers. Clones share the channel and the registry.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<OutpostEvent>>,
    registry: Arc<SubscriberRegistry>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            registry: Arc::new(SubscriberRegistry::new()),
            capacity,
        }
    }

    /// Publish an event.
    ///
    /// Returns the number of async receivers that received it.
    pub fn publish(&self, event: OutpostEvent) -> usize {
        let event = Arc::new(event);
        trace!(event_type = %event.event_type(), "Publishing event");

        // No receivers is fine.
        let count = self.sender.send(Arc::clone(&event)).unwrap_or(0);
        self.registry.notify(&event);
        count
    }

    /// Receive every published event.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            resource: None,
        }
    }

    /// Receive only `ResourceInvalidated` events for `resource`.
    #[must_use]
    pub fn subscribe_resource(&self, resource: ResourceKind) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            resource: Some(resource),
        }
    }

    /// The synchronous subscriber registry.
    #[must_use]
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Number of async receivers plus synchronous subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .receiver_count()
            .saturating_add(self.registry.len())
    }

    /// The channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for events from the event bus.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<OutpostEvent>>,
    resource: Option<ResourceKind>,
}

impl EventReceiver {
    fn matches(&self, event: &OutpostEvent) -> bool {
        match self.resource {
            None => true,
            Some(kind) => event.resource() == Some(kind),
        }
    }

    /// Receive the next matching event. Returns `None` once the bus is gone.
    ///
    /// Events dropped because this receiver lagged are logged and skipped.
    pub async fn recv(&mut self) -> Option<Arc<OutpostEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next matching event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<OutpostEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                },
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}
