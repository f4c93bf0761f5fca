/// Lightweight harness for in-process protocol tests
///
/// Every party in a test shares one [`TestEnv`], i.e. one blob store and
/// one feed store, the way peers would share a network.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::TestEnv;
///
/// #[tokio::test]
/// async fn test_actor() -> anyhow::Result<()> {
///     let env = TestEnv::new().await?;
///     let alice = TestEnv::party();
///
///     write_actor(env.channels(), &alice, &actor).await?;
///     assert!(read_actor(env.channels(), alice.public()).await?.is_some());
///     Ok(())
/// }
/// ```
use std::time::Duration;

use tempfile::TempDir;

use crate::crypto::SecretKey;
use crate::store::BlobsStore;
use crate::sync::{ChannelError, Channels};

/// Interval used by pollers in tests
pub const TEST_INTERVAL: Duration = Duration::from_millis(20);

pub struct TestEnv {
    channels: Channels,
    /// Keeps the on-disk blob store alive
    _dir: Option<TempDir>,
}

impl TestEnv {
    /// Environment over in-memory stores
    pub async fn new() -> Result<Self, ChannelError> {
        Ok(Self {
            channels: Channels::builder().build().await?,
            _dir: None,
        })
    }

    /// Environment whose blobs live in a temporary directory
    pub async fn on_disk() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let blobs = BlobsStore::fs(&dir.path().join("blobs")).await?;
        Ok(Self {
            channels: Channels::builder().blobs_store(blobs).build().await?,
            _dir: Some(dir),
        })
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    /// A fresh identity
    pub fn party() -> SecretKey {
        SecretKey::generate()
    }
}

/// Poll `check` until it holds or `timeout` elapses
///
/// # Returns
/// Whether `check` held before the timeout
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
