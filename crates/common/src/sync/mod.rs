//! Channel layer
//!
//! Turns a pair of stores into typed, optionally encrypted channels:
//!
//! - **feeds**: a single value per `(address, topic)`, overwritten on
//!   every write ([`FeedWriter`], [`FeedReader`])
//! - **timelines**: an append-only chain of immutable chapters stored as
//!   blobs, with the feed holding the id of the latest one
//!   ([`TimelineWriter`], [`TimelineReader`])
//!
//! Writers can be wrapped in a [`Publisher`] to serialize concurrent
//! writes, and readers can be polled into a [`Subscription`].
//!
//! A channel is encrypted iff the writer names a `reader` (or the reader
//! brings its own `key_pair`); the shared secret of the two keys then both
//! encrypts the payloads and scopes the topic.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::config::{BlobStoreConfig, Config};
use crate::crypto::{
    address, shared_secret, topic, Address, DeriveError, PeerId, Secret, SecretKey, Topic,
};
use crate::entity::{Entity, EntityCodec, EntityError, Registry, ValidationError};
use crate::feeds::{FeedStore, FeedStoreError, FeedUpdate, MemoryFeedStore};
use crate::store::{BlobsStore, BlobsStoreError, Hash};

mod feed;
mod publisher;
mod subscription;
mod timeline;

pub use feed::{FeedReader, FeedWriter};
pub use publisher::{Publisher, Push};
pub use subscription::Subscription;
pub use timeline::{Chapter, TimelineReader, TimelineWriter};

pub(crate) use subscription::{check_interval, Poll};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    /// Malformed caller input
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    /// The payload does not match its shape, nothing was written
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Published data could not be decrypted or decoded
    #[error("decode error: {0}")]
    Decode(String),
    /// A referenced blob is absent from the store
    #[error("content not found: {0}")]
    NotFound(Hash),
    /// The feed or blob store failed
    #[error("network error: {0}")]
    Network(String),
}

impl From<EntityError> for ChannelError {
    fn from(err: EntityError) -> Self {
        match err {
            EntityError::Validation(err) => ChannelError::Validation(err),
            EntityError::Decode(reason) => ChannelError::Decode(reason),
        }
    }
}

impl From<DeriveError> for ChannelError {
    fn from(err: DeriveError) -> Self {
        match err {
            DeriveError::InvalidParameters(reason) => ChannelError::InvalidParameters(reason),
        }
    }
}

impl From<FeedStoreError> for ChannelError {
    fn from(err: FeedStoreError) -> Self {
        ChannelError::Network(err.to_string())
    }
}

impl From<BlobsStoreError> for ChannelError {
    fn from(err: BlobsStoreError) -> Self {
        match err {
            BlobsStoreError::NotFound(hash) => ChannelError::NotFound(hash),
            err => ChannelError::Network(err.to_string()),
        }
    }
}

/// Write side of a channel
#[derive(Debug, Clone)]
pub struct WriterParams {
    /// Channel name, hashed into the topic
    pub name: Option<String>,
    /// The writer's own key pair, signs every update
    pub key_pair: SecretKey,
    /// Encrypt toward this peer. Must be a public key.
    pub reader: Option<PeerId>,
}

impl WriterParams {
    pub fn new(key_pair: SecretKey) -> Self {
        Self {
            name: None,
            key_pair,
            reader: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn reader(mut self, reader: impl Into<PeerId>) -> Self {
        self.reader = Some(reader.into());
        self
    }
}

/// Read side of a channel
#[derive(Debug, Clone)]
pub struct ReaderParams {
    pub name: Option<String>,
    /// Whose channel to read. May be an address for public channels.
    pub writer: PeerId,
    /// The reader's own key pair, required for encrypted channels
    pub key_pair: Option<SecretKey>,
}

impl ReaderParams {
    pub fn new(writer: impl Into<PeerId>) -> Self {
        Self {
            name: None,
            writer: writer.into(),
            key_pair: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn key_pair(mut self, key_pair: SecretKey) -> Self {
        self.key_pair = Some(key_pair);
        self
    }
}

/// Resolved coordinates of a channel
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub address: Address,
    pub topic: Topic,
    pub secret: Option<Secret>,
}

impl Slot {
    pub fn for_writer(params: &WriterParams) -> Result<Self, ChannelError> {
        let secret = match &params.reader {
            Some(reader) => Some(shared_secret(
                &params.key_pair,
                reader.require_key("reader")?,
            )?),
            None => None,
        };
        Ok(Self {
            address: address(&params.key_pair.public()),
            topic: topic(secret.as_ref(), params.name.as_deref())?,
            secret,
        })
    }

    pub fn for_reader(params: &ReaderParams) -> Result<Self, ChannelError> {
        let secret = match &params.key_pair {
            Some(key_pair) => Some(shared_secret(
                key_pair,
                params.writer.require_key("writer")?,
            )?),
            None => None,
        };
        Ok(Self {
            address: params.writer.address(),
            topic: topic(secret.as_ref(), params.name.as_deref())?,
            secret,
        })
    }
}

/// Builder for [`Channels`]
#[derive(Debug, Default)]
pub struct ChannelsBuilder {
    /// pre-loaded blobs store, in memory if not set
    blobs_store: Option<BlobsStore>,
    /// feed store, in memory if not set
    feed_store: Option<Arc<dyn FeedStore>>,
    /// shapes to validate against, the built-ins if not set
    registry: Option<Registry>,
}

impl ChannelsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blobs_store(mut self, blobs: BlobsStore) -> Self {
        self.blobs_store = Some(blobs);
        self
    }

    pub fn feed_store(mut self, feeds: Arc<dyn FeedStore>) -> Self {
        self.feed_store = Some(feeds);
        self
    }

    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub async fn build(self) -> Result<Channels, ChannelError> {
        let blobs = match self.blobs_store {
            Some(blobs) => blobs,
            None => BlobsStore::memory().await?,
        };
        let feeds = self
            .feed_store
            .unwrap_or_else(|| Arc::new(MemoryFeedStore::new()));
        let codec = EntityCodec::new(self.registry.unwrap_or_default());
        Ok(Channels {
            blobs,
            feeds,
            codec,
        })
    }
}

/// Handle over the stores every channel is built on.
///  Cheap to clone, every clone shares the same stores.
#[derive(Debug, Clone)]
pub struct Channels {
    blobs: BlobsStore,
    feeds: Arc<dyn FeedStore>,
    codec: EntityCodec,
}

impl Channels {
    pub fn builder() -> ChannelsBuilder {
        ChannelsBuilder::new()
    }

    /// Build channels over the blob store described by `config`
    ///  and an in-memory feed store
    pub async fn from_config(config: &Config) -> Result<Self, ChannelError> {
        let blobs = match &config.blob_store {
            BlobStoreConfig::Memory => BlobsStore::memory().await?,
            BlobStoreConfig::Filesystem { path } => BlobsStore::fs(path).await?,
        };
        Self::builder().blobs_store(blobs).build().await
    }

    pub fn blobs(&self) -> &BlobsStore {
        &self.blobs
    }

    pub fn feeds(&self) -> &Arc<dyn FeedStore> {
        &self.feeds
    }

    pub fn codec(&self) -> &EntityCodec {
        &self.codec
    }

    pub fn feed_writer<T: Entity>(
        &self,
        params: WriterParams,
    ) -> Result<FeedWriter<T>, ChannelError> {
        let slot = Slot::for_writer(&params)?;
        Ok(FeedWriter::new(self.clone(), params.key_pair, slot))
    }

    pub fn feed_reader<T: Entity>(
        &self,
        params: ReaderParams,
    ) -> Result<FeedReader<T>, ChannelError> {
        let slot = Slot::for_reader(&params)?;
        Ok(FeedReader::new(self.clone(), slot))
    }

    /// Write a single value to a feed
    pub async fn write_feed<T: Entity>(
        &self,
        params: WriterParams,
        data: &T,
    ) -> Result<(), ChannelError> {
        self.feed_writer(params)?.write(data).await
    }

    /// Read the current value of a feed, `None` if it was never written
    pub async fn read_feed<T: Entity>(
        &self,
        params: ReaderParams,
    ) -> Result<Option<T>, ChannelError> {
        self.feed_reader(params)?.read().await
    }

    /// A feed writer whose writes are applied one at a time, in call order
    pub fn feed_publisher<T: Entity>(
        &self,
        params: WriterParams,
    ) -> Result<Publisher<FeedWriter<T>>, ChannelError> {
        Ok(Publisher::new(self.feed_writer(params)?))
    }

    /// Poll a feed every `interval`, emitting its value whenever it changes
    pub fn feed_subscriber<T: Entity>(
        &self,
        params: ReaderParams,
        interval: Duration,
    ) -> Result<Subscription<Option<T>>, ChannelError> {
        Ok(self.feed_reader(params)?.subscribe(interval))
    }

    pub fn timeline_writer<T: Entity>(
        &self,
        params: WriterParams,
    ) -> Result<TimelineWriter<T>, ChannelError> {
        let slot = Slot::for_writer(&params)?;
        Ok(TimelineWriter::new(self.clone(), params.key_pair, slot))
    }

    pub fn timeline_reader<T: Entity>(
        &self,
        params: ReaderParams,
    ) -> Result<TimelineReader<T>, ChannelError> {
        let slot = Slot::for_reader(&params)?;
        Ok(TimelineReader::new(self.clone(), slot))
    }

    /// A timeline writer whose appends are applied one at a time, in call order
    pub fn timeline_publisher<T: Entity>(
        &self,
        params: WriterParams,
    ) -> Result<Publisher<TimelineWriter<T>>, ChannelError> {
        Ok(Publisher::new(self.timeline_writer(params)?))
    }

    /// Sign and commit a raw payload at `slot`
    pub(crate) async fn set_pointer(
        &self,
        key_pair: &SecretKey,
        slot: &Slot,
        payload: Bytes,
    ) -> Result<(), ChannelError> {
        let size = payload.len();
        let update = FeedUpdate::sign(key_pair, &slot.topic, payload);
        self.feeds.set(slot.address, slot.topic, update).await?;
        tracing::debug!(
            "set feed {}/{} ({} bytes)",
            slot.address,
            slot.topic,
            size
        );
        Ok(())
    }

    /// Fetch and authenticate the raw payload at `slot`
    pub(crate) async fn get_pointer(&self, slot: &Slot) -> Result<Option<Bytes>, ChannelError> {
        let Some(update) = self.feeds.get(slot.address, slot.topic).await? else {
            return Ok(None);
        };
        update
            .verify(&slot.address, &slot.topic)
            .map_err(|e| ChannelError::Decode(e.to_string()))?;
        Ok(Some(update.payload))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_encrypted_slots_match() {
        let writer = SecretKey::generate();
        let reader = SecretKey::generate();

        let w = Slot::for_writer(
            &WriterParams::new(writer.clone())
                .name("chat")
                .reader(reader.public()),
        )
        .unwrap();
        let r = Slot::for_reader(
            &ReaderParams::new(writer.public())
                .name("chat")
                .key_pair(reader),
        )
        .unwrap();

        assert_eq!(w.address, r.address);
        assert_eq!(w.topic, r.topic);
        assert_eq!(w.secret, r.secret);
        assert!(w.secret.is_some());
    }

    #[test]
    fn test_public_slot_by_address() {
        let writer = SecretKey::generate();
        let w = Slot::for_writer(&WriterParams::new(writer.clone()).name("actor")).unwrap();
        let r = Slot::for_reader(&ReaderParams::new(address(&writer.public())).name("actor"))
            .unwrap();

        assert_eq!(w.address, r.address);
        assert_eq!(w.topic, r.topic);
        assert!(r.secret.is_none());
    }

    #[test]
    fn test_address_where_key_is_needed() {
        let writer = SecretKey::generate();
        let reader = SecretKey::generate();

        let result = Slot::for_writer(
            &WriterParams::new(writer.clone()).reader(address(&reader.public())),
        );
        assert!(matches!(result, Err(ChannelError::InvalidParameters(_))));

        let result = Slot::for_reader(
            &ReaderParams::new(address(&writer.public())).key_pair(reader),
        );
        assert!(matches!(result, Err(ChannelError::InvalidParameters(_))));
    }
}
