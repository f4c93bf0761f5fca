use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fs::FileData;
use crate::crypto::{PeerId, PublicKey, SecretKey};
use crate::entity::{schema, Entity};
use crate::sync::{
    ChannelError, Channels, FeedWriter, Publisher, Push, ReaderParams, Subscription,
    WriterParams,
};

/// Public topic name actors publish on
pub const ACTOR_TOPIC: &str = "actor";

/// Human facing description of an actor or contact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<FileData>,
    /// Application defined fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            ..Default::default()
        }
    }
}

/// Public identity record, discoverable by address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub public_key: PublicKey,
    pub profile: Profile,
}

impl Entity for Actor {
    const TYPE: &'static str = schema::ACTOR;
}

fn check_owner(writer: &PublicKey, data: &Actor) -> Result<(), ChannelError> {
    if data.public_key != *writer {
        return Err(ChannelError::InvalidParameters(format!(
            "actor record names key {} but is written by {}",
            data.public_key, writer
        )));
    }
    Ok(())
}

fn actor_params(key_pair: &SecretKey, data: &Actor) -> Result<WriterParams, ChannelError> {
    check_owner(&key_pair.public(), data)?;
    Ok(WriterParams::new(key_pair.clone()).name(ACTOR_TOPIC))
}

/// The actor feed of one key pair
///
/// Every record pushed must name the writing key as its `public_key`.
#[derive(Debug)]
pub struct ActorWriter {
    key: PublicKey,
    feed: FeedWriter<Actor>,
}

#[async_trait]
impl Push for ActorWriter {
    type Item = Actor;
    type Output = ();

    async fn push(&mut self, item: &Actor) -> Result<(), ChannelError> {
        check_owner(&self.key, item)?;
        self.feed.write(item).await
    }
}

/// Publish (or overwrite) the actor record of `key_pair`, unencrypted
pub async fn write_actor(
    channels: &Channels,
    key_pair: &SecretKey,
    data: &Actor,
) -> Result<(), ChannelError> {
    channels.write_feed(actor_params(key_pair, data)?, data).await
}

/// A publisher for repeated updates of the actor record of `key_pair`
pub fn actor_writer(
    channels: &Channels,
    key_pair: &SecretKey,
) -> Result<Publisher<ActorWriter>, ChannelError> {
    let feed = channels.feed_writer(WriterParams::new(key_pair.clone()).name(ACTOR_TOPIC))?;
    Ok(Publisher::new(ActorWriter {
        key: key_pair.public(),
        feed,
    }))
}

/// Read the actor record published at `actor` (key or address)
pub async fn read_actor(
    channels: &Channels,
    actor: impl Into<PeerId>,
) -> Result<Option<Actor>, ChannelError> {
    channels
        .read_feed(ReaderParams::new(actor).name(ACTOR_TOPIC))
        .await
}

/// Poll the actor record at `actor`, emitting every change
pub fn actor_subscriber(
    channels: &Channels,
    actor: impl Into<PeerId>,
    interval: Duration,
) -> Result<Subscription<Option<Actor>>, ChannelError> {
    channels.feed_subscriber(ReaderParams::new(actor).name(ACTOR_TOPIC), interval)
}
