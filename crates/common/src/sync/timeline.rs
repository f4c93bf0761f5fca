use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChannelError, Channels, Poll, Push, Slot, Subscription};
use crate::crypto::{Address, SecretKey};
use crate::entity::{open, seal, Entity, RawEntity};
use crate::store::Hash;

pub const TIMELINE_PROTOCOL: &str = "timeline";
pub const TIMELINE_VERSION: &str = "1.0.0";

/// A chapter as stored in the blob store.
///  Encrypted as a whole when the channel is.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterBody {
    protocol: String,
    version: String,
    author: Address,
    /// milliseconds since the unix epoch
    timestamp: i64,
    content: RawEntity,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::store::hash_hex::option"
    )]
    previous: Option<Hash>,
}

/// An immutable entry of a timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter<T> {
    /// Content hash of the stored chapter
    pub id: Hash,
    pub author: Address,
    pub timestamp: DateTime<Utc>,
    /// The chapter this one was appended after, `None` for the first
    pub previous: Option<Hash>,
    pub content: T,
}

fn parse_head(payload: &Bytes) -> Result<Hash, ChannelError> {
    let bytes: [u8; 32] = payload.as_ref().try_into().map_err(|_| {
        ChannelError::Decode(format!(
            "timeline head must be 32 bytes, got {}",
            payload.len()
        ))
    })?;
    Ok(Hash::from_bytes(bytes))
}

/// Appends chapters of `T` to the writer's own timeline
pub struct TimelineWriter<T> {
    channels: Channels,
    key_pair: SecretKey,
    slot: Slot,
    /// Latest chapter, resolved from the feed before the first append
    head: Option<Option<Hash>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for TimelineWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelineWriter")
            .field("address", &self.slot.address)
            .field("topic", &self.slot.topic)
            .field("head", &self.head)
            .finish()
    }
}

impl<T: Entity> TimelineWriter<T> {
    pub(crate) fn new(channels: Channels, key_pair: SecretKey, slot: Slot) -> Self {
        Self {
            channels,
            key_pair,
            slot,
            head: None,
            _entity: PhantomData,
        }
    }

    pub fn address(&self) -> Address {
        self.slot.address
    }

    /// Append a chapter holding `data` and point the feed at it
    ///
    /// # Returns
    /// The id of the new chapter
    pub async fn append(&mut self, data: &T) -> Result<Hash, ChannelError> {
        // validate before anything touches the stores
        let content = self.channels.codec().to_raw(data)?;

        let previous = match self.head {
            Some(head) => head,
            None => match self.channels.get_pointer(&self.slot).await? {
                Some(payload) => Some(parse_head(&payload)?),
                None => None,
            },
        };

        let body = ChapterBody {
            protocol: TIMELINE_PROTOCOL.to_string(),
            version: TIMELINE_VERSION.to_string(),
            author: self.slot.address,
            timestamp: Utc::now().timestamp_millis(),
            content,
            previous,
        };
        let bytes = seal(&body, self.slot.secret.as_ref())?;
        let id = self.channels.blobs().put(bytes).await?;

        self.channels
            .set_pointer(
                &self.key_pair,
                &self.slot,
                Bytes::copy_from_slice(id.as_bytes()),
            )
            .await?;
        self.head = Some(Some(id));

        tracing::debug!(
            "appended chapter {} to timeline {}/{}",
            id,
            self.slot.address,
            self.slot.topic
        );
        Ok(id)
    }
}

#[async_trait]
impl<T: Entity> Push for TimelineWriter<T> {
    type Item = T;
    type Output = Hash;

    async fn push(&mut self, item: &T) -> Result<Hash, ChannelError> {
        self.append(item).await
    }
}

/// Reads chapters of `T` from a writer's timeline
pub struct TimelineReader<T> {
    channels: Channels,
    slot: Slot,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for TimelineReader<T> {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
            slot: self.slot.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TimelineReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelineReader")
            .field("address", &self.slot.address)
            .field("topic", &self.slot.topic)
            .field("encrypted", &self.slot.secret.is_some())
            .finish()
    }
}

impl<T: Entity> TimelineReader<T> {
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

    /// Id of the latest chapter, `None` if nothing was appended yet
    pub async fn head(&self) -> Result<Option<Hash>, ChannelError> {
        match self.channels.get_pointer(&self.slot).await? {
            Some(payload) => Ok(Some(parse_head(&payload)?)),
            None => Ok(None),
        }
    }

    pub async fn latest_chapter(&self) -> Result<Option<Chapter<T>>, ChannelError> {
        match self.head().await? {
            Some(id) => Ok(Some(self.chapter(id).await?)),
            None => Ok(None),
        }
    }

    /// Fetch and decode a chapter by id
    pub async fn chapter(&self, id: Hash) -> Result<Chapter<T>, ChannelError> {
        let bytes = self.channels.blobs().get(&id).await?;
        let body: ChapterBody = open(&bytes, self.slot.secret.as_ref())?;

        if body.protocol != TIMELINE_PROTOCOL {
            return Err(ChannelError::Decode(format!(
                "chapter {} is not a timeline chapter",
                id
            )));
        }
        if body.author != self.slot.address {
            return Err(ChannelError::Decode(format!(
                "chapter {} was written by {}, expected {}",
                id, body.author, self.slot.address
            )));
        }
        let timestamp = DateTime::<Utc>::from_timestamp_millis(body.timestamp).ok_or_else(|| {
            ChannelError::Decode(format!("chapter {} has an invalid timestamp", id))
        })?;
        let content = self.channels.codec().from_raw(body.content)?;

        Ok(Chapter {
            id,
            author: body.author,
            timestamp,
            previous: body.previous,
            content,
        })
    }

    /// Walk back from `head` until `until` (exclusive) or the first chapter
    ///
    /// # Returns
    /// The chapters in append order, oldest first
    pub async fn chapters_between(
        &self,
        head: Hash,
        until: Option<Hash>,
    ) -> Result<Vec<Chapter<T>>, ChannelError> {
        let mut chapters = Vec::new();
        let mut next = Some(head);
        while let Some(id) = next {
            if Some(id) == until {
                break;
            }
            let chapter = self.chapter(id).await?;
            next = chapter.previous;
            chapters.push(chapter);
        }
        chapters.reverse();
        Ok(chapters)
    }

    /// Poll the timeline every `interval`, emitting each new latest chapter
    pub fn poll_latest_chapter(&self, interval: Duration) -> Subscription<Chapter<T>> {
        Subscription::spawn(
            interval,
            TimelinePoll {
                reader: self.clone(),
                last: None,
            },
        )
    }
}

struct TimelinePoll<T> {
    reader: TimelineReader<T>,
    last: Option<Hash>,
}

#[async_trait]
impl<T: Entity> Poll for TimelinePoll<T> {
    type Item = Chapter<T>;

    async fn poll(&mut self) -> Result<Option<Chapter<T>>, ChannelError> {
        let Some(head) = self.reader.head().await? else {
            return Ok(None);
        };
        if self.last == Some(head) {
            return Ok(None);
        }
        let chapter = self.reader.chapter(head).await?;
        self.last = Some(head);
        Ok(Some(chapter))
    }
}
