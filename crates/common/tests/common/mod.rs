//! Shared test utilities for protocol integration tests
#![allow(dead_code)]

use std::time::Duration;

use common::crypto::SecretKey;
use common::protocol::{Actor, Profile};
use common::testkit::TestEnv;
use tracing_subscriber::EnvFilter;

/// Upper bound on any wait for a poller
pub const WAIT: Duration = Duration::from_secs(5);

/// Polling interval used by subscribers and agents
pub const INTERVAL: Duration = common::testkit::TEST_INTERVAL;

/// Set up a fresh in-memory environment
pub async fn setup_test_env() -> TestEnv {
    init_tracing();
    TestEnv::new().await.unwrap()
}

/// Print library logs, filtered by `RUST_LOG`, through the test harness
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// The actor record of `key_pair`, displayed as `name`
pub fn actor(key_pair: &SecretKey, name: &str) -> Actor {
    Actor {
        public_key: key_pair.public(),
        profile: Profile::named(name),
    }
}
