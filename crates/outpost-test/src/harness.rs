//! Test process setup.

use std::sync::Once;

static LOGGING: Once = Once::new();

/// Route `tracing` output through the test writer.
///
/// Honours `RUST_LOG`; defaults to `debug` for outpost crates. Safe to call
/// from every test.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,outpost=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
