use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::ChannelError;

/// A writer that can be driven by a [`Publisher`]
#[async_trait]
pub trait Push: Send + 'static {
    type Item: Send + Sync + ?Sized;
    type Output: Send;

    async fn push(&mut self, item: &Self::Item) -> Result<Self::Output, ChannelError>;
}

/// Serializes writes to a single channel
///
/// A feed slot holds exactly one value, so two writes racing on it could
/// land in either order. Calls to [`Publisher::publish`] queue on a fair
/// mutex and are applied one at a time in call order. A failed write is
/// returned to its own caller and does not affect the ones queued after it.
#[derive(Debug)]
pub struct Publisher<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for Publisher<W> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<W: Push> Publisher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub async fn publish(&self, item: &W::Item) -> Result<W::Output, ChannelError> {
        let mut writer = self.inner.lock().await;
        writer.push(item).await
    }
}
