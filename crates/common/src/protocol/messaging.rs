use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::fs::FileData;
use crate::crypto::{Address, PeerId, SecretKey};
use crate::entity::{schema, Entity};
use crate::store::Hash;
use crate::sync::{
    ChannelError, Channels, Chapter, Publisher, ReaderParams, Subscription, TimelineReader,
    TimelineWriter, WriterParams,
};

/// Topic name mailboxes are published on
pub const MAILBOX_TOPIC: &str = "mailbox";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file: FileData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Chapter id of the first message of the thread
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::store::hash_hex::option"
    )]
    pub thread: Option<Hash>,
    /// Chapter id of the message this one answers
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::store::hash_hex::option"
    )]
    pub reply_to: Option<Hash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

impl Message {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            title: None,
            thread: None,
            reply_to: None,
            attachments: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl Entity for Message {
    const TYPE: &'static str = schema::MESSAGE;
}

/// Serialized appends to a mailbox
pub type MailboxWriter = Publisher<TimelineWriter<Message>>;

/// Create the mailbox of `key_pair`, encrypted toward `reader` when given
pub fn mailbox_writer(
    channels: &Channels,
    key_pair: SecretKey,
    reader: Option<PeerId>,
) -> Result<MailboxWriter, ChannelError> {
    let mut params = WriterParams::new(key_pair).name(MAILBOX_TOPIC);
    params.reader = reader;
    channels.timeline_publisher(params)
}

/// Create a reader over the mailbox of `writer`
pub fn mailbox_reader(
    channels: &Channels,
    writer: impl Into<PeerId>,
    key_pair: Option<SecretKey>,
) -> Result<MailboxReader, ChannelError> {
    let mut params = ReaderParams::new(writer).name(MAILBOX_TOPIC);
    params.key_pair = key_pair;
    Ok(MailboxReader {
        timeline: channels.timeline_reader(params)?,
    })
}

/// Reads the messages of one mailbox
#[derive(Debug, Clone)]
pub struct MailboxReader {
    timeline: TimelineReader<Message>,
}

impl MailboxReader {
    /// Address of the mailbox writer
    pub fn address(&self) -> Address {
        self.timeline.address()
    }

    /// Id of the latest message, `None` if the mailbox is empty
    pub async fn head(&self) -> Result<Option<Hash>, ChannelError> {
        self.timeline.head().await
    }

    pub async fn latest_chapter(&self) -> Result<Option<Chapter<Message>>, ChannelError> {
        self.timeline.latest_chapter().await
    }

    pub async fn chapter(&self, id: Hash) -> Result<Chapter<Message>, ChannelError> {
        self.timeline.chapter(id).await
    }

    /// Every message from `head` back to (not including) `until`, oldest first
    pub async fn chapters_between(
        &self,
        head: Hash,
        until: Option<Hash>,
    ) -> Result<Vec<Chapter<Message>>, ChannelError> {
        self.timeline.chapters_between(head, until).await
    }

    /// Poll the mailbox head every `interval`
    pub fn poll_latest_chapter(&self, interval: Duration) -> Subscription<Chapter<Message>> {
        self.timeline.poll_latest_chapter(interval)
    }
}
