//! Shared harness for integration tests.
//!
//! Each test binary uses a subset of these helpers; shared items carry
//! `allow(dead_code)`.

use std::sync::Arc;
use std::time::Duration;

use outpost_config::{Config, StorageBackend};
use outpost_events::EventReceiver;
use outpost_runtime::Outpost;
use outpost_test::{MockRemote, init_test_logging};

/// An [`Outpost`] wired to a [`MockRemote`].
///
/// Periodic and capture-triggered syncs are off unless the caller turns
/// them on, so tests decide when delivery happens.
#[allow(dead_code)]
pub struct OutpostHarness {
    /// The service under test.
    pub outpost: Arc<Outpost>,
    /// The remote it talks to.
    pub remote: MockRemote,
}

#[allow(dead_code)]
impl OutpostHarness {
    /// In-memory store with the default bound.
    pub async fn new() -> Self {
        Self::with_config(quiet_config(), MockRemote::new()).await
    }

    /// Build from an explicit config and remote.
    pub async fn with_config(config: Config, remote: MockRemote) -> Self {
        init_test_logging();
        let outpost = Outpost::with_remote(config, Arc::new(remote.clone()))
            .await
            .expect("outpost should start");
        Self {
            outpost: Arc::new(outpost),
            remote,
        }
    }
}

/// Memory backend, no automatic syncs.
#[allow(dead_code)]
pub fn quiet_config() -> Config {
    let mut config = Config::default();
    config.storage.backend = StorageBackend::Memory;
    config.sync.sync_on_capture = false;
    config.sync.interval_secs = 3600;
    config
}

/// Wait for the next bus event of `event_type`, failing after five seconds.
#[allow(dead_code)]
pub async fn wait_for(events: &mut EventReceiver, event_type: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            if event.event_type() == event_type {
                return;
            }
        }
        panic!("bus closed before {event_type}");
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {event_type}"));
}
