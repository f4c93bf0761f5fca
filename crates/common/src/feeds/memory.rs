use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::provider::{FeedStore, FeedStoreError, FeedUpdate};
use crate::crypto::{Address, Topic};

/// In-memory feed store using a HashMap
#[derive(Debug, Clone)]
pub struct MemoryFeedStore {
    inner: Arc<RwLock<MemoryFeedStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryFeedStoreInner {
    /// Live update per slot
    feeds: HashMap<(Address, Topic), FeedUpdate>,
}

impl MemoryFeedStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryFeedStoreInner::default())),
        }
    }

    /// Number of slots that have ever been written
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.feeds.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryFeedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedStore for MemoryFeedStore {
    async fn set(
        &self,
        address: Address,
        topic: Topic,
        update: FeedUpdate,
    ) -> Result<(), FeedStoreError> {
        update.verify(&address, &topic)?;

        let mut inner = self.inner.write().map_err(|e| {
            FeedStoreError::Provider(format!("failed to acquire write lock: {}", e))
        })?;
        inner.feeds.insert((address, topic), update);
        Ok(())
    }

    async fn get(
        &self,
        address: Address,
        topic: Topic,
    ) -> Result<Option<FeedUpdate>, FeedStoreError> {
        let inner = self.inner.read().map_err(|e| {
            FeedStoreError::Provider(format!("failed to acquire read lock: {}", e))
        })?;

        Ok(inner.feeds.get(&(address, topic)).cloned())
    }
}
