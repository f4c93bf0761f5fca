//! Two step contact handshake
//!
//! 1. Each actor writes a [`FirstContact`] on the channel derived from its
//!    own key and the other's *actor* key. It names a fresh contact key.
//! 2. Each side writes its [`Contact`] record on the channel derived from
//!    its contact key and the other's contact key.
//!
//! Knowing an actor's public key is enough to reach step 1, but only the
//! two parties who exchanged contact keys can reach step 2.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::actor::Profile;
use crate::crypto::{Address, PeerId, PublicKey, SecretKey};
use crate::entity::{schema, Entity};
use crate::sync::{ChannelError, Channels, ReaderParams, Subscription, WriterParams};

pub const FIRST_CONTACT_TOPIC: &str = "first-contact";
pub const CONTACT_TOPIC: &str = "contact";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstContact {
    /// Key the sender will use on the contact channel
    pub contact_public_key: PublicKey,
    pub actor_address: Address,
}

impl Entity for FirstContact {
    const TYPE: &'static str = schema::FIRST_CONTACT;
}

/// Named mailbox public keys
pub type MailboxesRecord = BTreeMap<String, PublicKey>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    /// Writer key of a file system shared with the other side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_system_key: Option<PublicKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailboxes: Option<MailboxesRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Contact {
    const TYPE: &'static str = schema::CONTACT;
}

fn writer_params(key_pair: &SecretKey, peer_key: PeerId, topic: &str) -> WriterParams {
    WriterParams::new(key_pair.clone())
        .name(topic)
        .reader(peer_key)
}

fn reader_params(key_pair: &SecretKey, peer_key: PeerId, topic: &str) -> ReaderParams {
    ReaderParams::new(peer_key)
        .name(topic)
        .key_pair(key_pair.clone())
}

/// Write a first contact toward the owner of `actor_key`
///
/// Fails with `InvalidParameters` if `actor_key` is an address.
pub async fn write_first_contact(
    channels: &Channels,
    key_pair: &SecretKey,
    actor_key: impl Into<PeerId>,
    data: &FirstContact,
) -> Result<(), ChannelError> {
    channels
        .write_feed(
            writer_params(key_pair, actor_key.into(), FIRST_CONTACT_TOPIC),
            data,
        )
        .await
}

/// Read the first contact the owner of `actor_key` wrote toward `key_pair`
pub async fn read_first_contact(
    channels: &Channels,
    key_pair: &SecretKey,
    actor_key: impl Into<PeerId>,
) -> Result<Option<FirstContact>, ChannelError> {
    channels
        .read_feed(reader_params(key_pair, actor_key.into(), FIRST_CONTACT_TOPIC))
        .await
}

pub fn first_contact_subscriber(
    channels: &Channels,
    key_pair: &SecretKey,
    actor_key: impl Into<PeerId>,
    interval: Duration,
) -> Result<Subscription<Option<FirstContact>>, ChannelError> {
    channels.feed_subscriber(
        reader_params(key_pair, actor_key.into(), FIRST_CONTACT_TOPIC),
        interval,
    )
}

/// Write a contact record toward the owner of `contact_key`
pub async fn write_contact(
    channels: &Channels,
    key_pair: &SecretKey,
    contact_key: impl Into<PeerId>,
    data: &Contact,
) -> Result<(), ChannelError> {
    channels
        .write_feed(writer_params(key_pair, contact_key.into(), CONTACT_TOPIC), data)
        .await
}

pub async fn read_contact(
    channels: &Channels,
    key_pair: &SecretKey,
    contact_key: impl Into<PeerId>,
) -> Result<Option<Contact>, ChannelError> {
    channels
        .read_feed(reader_params(key_pair, contact_key.into(), CONTACT_TOPIC))
        .await
}

pub fn contact_subscriber(
    channels: &Channels,
    key_pair: &SecretKey,
    contact_key: impl Into<PeerId>,
    interval: Duration,
) -> Result<Subscription<Option<Contact>>, ChannelError> {
    channels.feed_subscriber(
        reader_params(key_pair, contact_key.into(), CONTACT_TOPIC),
        interval,
    )
}
