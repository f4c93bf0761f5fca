/**
 * Agents that turn mailboxes into live,
 *  observable message streams.
 */
pub mod agent;
/**
 * TOML configuration of polling, stream
 *  capacities and the blob store backend.
 */
pub mod config;
/**
 * Cryptographic types and operations.
 *  - Public and Private key implementations
 *  - Symmetric secrets
 *  - Addresses, topics and shared secrets
 */
pub mod crypto;
/**
 * Typed payloads: shapes, validation and
 *  the encoding stored at rest.
 */
pub mod entity;
/**
 * Signed, mutable single-value pointers
 *  keyed by (address, topic).
 */
pub mod feeds;
/**
 * Actor, contact, file system and
 *  mailbox protocols.
 */
pub mod protocol;
/**
 * Storage layer implementation.
 *  Just a light wrapper around an Iroh-Blobs
 *  store.
 */
pub mod store;
/**
 * Channel layer: feeds, timelines, publishers
 *  and polling subscriptions.
 */
pub mod sync;
pub mod testkit;

pub mod prelude {
    pub use crate::agent::{InboxAgent, InboxState, InboxesAgent, OutboxesAgent};
    pub use crate::config::Config;
    pub use crate::crypto::{address, Address, PeerId, PublicKey, SecretKey};
    pub use crate::protocol::{
        Actor, Contact, FileData, FileSystem, FileSystemReader, FileSystemWriter, FirstContact,
        Message, Profile,
    };
    pub use crate::sync::{ChannelError, Channels, ReaderParams, WriterParams};
}
