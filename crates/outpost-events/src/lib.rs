//! Outpost Events - typed publish/subscribe for the queue and sync engine.
//!
//! Every notification is a variant of the closed [`OutpostEvent`] enum.
//! Cache invalidation is keyed by [`ResourceKind`](outpost_core::ResourceKind),
//! so a view of invoices subscribes with
//! [`EventBus::subscribe_resource`] and never sees string tags.
//!
//! There are two ways to subscribe:
//!
//! 1. **Async receivers**: `bus.subscribe()` or `bus.subscribe_resource(..)`
//!    return an [`EventReceiver`].
//! 2. **Synchronous subscribers**: implement [`EventSubscriber`] and register
//!    it with [`EventBus::registry`].
//!
//! # Example
//!
//! ```rust
//! use outpost_core::ResourceKind;
//! use outpost_events::{EventBus, EventMetadata, OutpostEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut invoices = bus.subscribe_resource(ResourceKind::Invoices);
//!
//! bus.publish(OutpostEvent::ResourceInvalidated {
//!     metadata: EventMetadata::new("sync"),
//!     resource: ResourceKind::Invoices,
//! });
//!
//! let event = invoices.recv().await.unwrap();
//! assert_eq!(event.event_type(), "resource_invalidated");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod event;
mod subscriber;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{EventMetadata, OutpostEvent};
pub use subscriber::{EventSubscriber, SubscriberId, SubscriberRegistry};
