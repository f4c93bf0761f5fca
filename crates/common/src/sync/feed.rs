use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::{ChannelError, Channels, Poll, Push, Slot, Subscription};
use crate::crypto::{Address, SecretKey, Topic};
use crate::entity::Entity;

/// Writes single values of `T` to the writer's own feed
pub struct FeedWriter<T> {
    channels: Channels,
    key_pair: SecretKey,
    slot: Slot,
    _entity: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for FeedWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedWriter")
            .field("address", &self.slot.address)
            .field("topic", &self.slot.topic)
            .field("encrypted", &self.slot.secret.is_some())
            .finish()
    }
}

impl<T: Entity> FeedWriter<T> {
    pub(crate) fn new(channels: Channels, key_pair: SecretKey, slot: Slot) -> Self {
        Self {
            channels,
            key_pair,
            slot,
            _entity: PhantomData,
        }
    }

    pub fn address(&self) -> Address {
        self.slot.address
    }

    pub fn topic(&self) -> Topic {
        self.slot.topic
    }

    /// A reader over this writer's own feed
    pub fn reader(&self) -> FeedReader<T> {
        FeedReader::new(self.channels.clone(), self.slot.clone())
    }

    /// Validate, encode and commit `data`, replacing the previous value
    pub async fn write(&self, data: &T) -> Result<(), ChannelError> {
        let bytes = self
            .channels
            .codec()
            .encode(data, self.slot.secret.as_ref())?;
        self.channels
            .set_pointer(&self.key_pair, &self.slot, Bytes::from(bytes))
            .await
    }
}

#[async_trait]
impl<T: Entity> Push for FeedWriter<T> {
    type Item = T;
    type Output = ();

    async fn push(&mut self, item: &T) -> Result<(), ChannelError> {
        self.write(item).await
    }
}

/// Reads single values of `T` from a writer's feed
pub struct FeedReader<T> {
    channels: Channels,
    slot: Slot,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for FeedReader<T> {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
            slot: self.slot.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for FeedReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedReader")
            .field("address", &self.slot.address)
            .field("topic", &self.slot.topic)
            .field("encrypted", &self.slot.secret.is_some())
            .finish()
    }
}

impl<T: Entity> FeedReader<T> {
    pub(crate) fn new(channels: Channels, slot: Slot) -> Self {
        Self {
            channels,
            slot,
            _entity: PhantomData,
        }
    }

    pub fn address(&self) -> Address {
        self.slot.address
    }

    pub fn topic(&self) -> Topic {
        self.slot.topic
    }

    /// Read the current value
    ///
    /// # Returns
    /// * `Ok(Some(value))` - the last written value
    /// * `Ok(None)` - the feed was never written
    /// * `Err(ChannelError::Decode)` - a value exists but cannot be decoded
    pub async fn read(&self) -> Result<Option<T>, ChannelError> {
        match self.channels.get_pointer(&self.slot).await? {
            Some(bytes) => Ok(Some(self.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, ChannelError> {
        Ok(self
            .channels
            .codec()
            .decode(bytes, self.slot.secret.as_ref())?)
    }

    /// Poll the feed every `interval`, emitting whenever its value changes.
    ///  The first observation is always emitted, `None` if the feed is empty.
    pub fn subscribe(&self, interval: Duration) -> Subscription<Option<T>> {
        Subscription::spawn(
            interval,
            FeedPoll {
                reader: self.clone(),
                last: None,
            },
        )
    }
}

struct FeedPoll<T> {
    reader: FeedReader<T>,
    /// Raw payload seen on the previous tick, `None` before the first
    last: Option<Option<Bytes>>,
}

#[async_trait]
impl<T: Entity> Poll for FeedPoll<T> {
    type Item = Option<T>;

    async fn poll(&mut self) -> Result<Option<Option<T>>, ChannelError> {
        let payload = self.reader.channels.get_pointer(&self.reader.slot).await?;
        if self.last.as_ref() == Some(&payload) {
            return Ok(None);
        }
        let value = match &payload {
            Some(bytes) => Some(self.reader.decode(bytes)?),
            None => None,
        };
        self.last = Some(payload);
        Ok(Some(value))
    }
}
