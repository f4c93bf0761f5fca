use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

use crate::crypto::{address, Address, PublicKey, SecretKey, Signature, Topic};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedStoreError {
    /// The backing store failed to serve the request
    #[error("unhandled feed store provider error: {0}")]
    Provider(String),
    /// The update was signed by a key that does not own
    ///  the address it is written to
    #[error("update key does not match feed address {0}")]
    AddressMismatch(Address),
    /// The update signature does not cover the
    ///  address, topic and payload it claims
    #[error("invalid signature for feed {0}/{1}")]
    InvalidSignature(Address, Topic),
}

/// A signed value for one feed slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUpdate {
    /// Key of the writer, must hash to the slot's address
    pub public_key: PublicKey,
    /// The committed payload
    pub payload: Bytes,
    /// Signature over [`FeedUpdate::digest`]
    pub signature: Signature,
}

impl FeedUpdate {
    /// The bytes a writer signs: `blake3(address || topic || payload)`
    pub fn digest(address: &Address, topic: &Topic, payload: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(address.as_bytes());
        hasher.update(topic.as_bytes());
        hasher.update(payload);
        *hasher.finalize().as_bytes()
    }

    /// Sign a payload for the writer's own feed at `topic`
    pub fn sign(secret_key: &SecretKey, topic: &Topic, payload: Bytes) -> Self {
        let public_key = secret_key.public();
        let digest = Self::digest(&address(&public_key), topic, &payload);
        Self {
            public_key,
            signature: secret_key.sign(&digest),
            payload,
        }
    }

    /// Check that this update may be committed at `address`/`topic`
    pub fn verify(&self, address: &Address, topic: &Topic) -> Result<(), FeedStoreError> {
        if crate::crypto::address(&self.public_key) != *address {
            return Err(FeedStoreError::AddressMismatch(*address));
        }
        let digest = Self::digest(address, topic, &self.payload);
        self.public_key
            .verify(&digest, &self.signature)
            .map_err(|_| FeedStoreError::InvalidSignature(*address, *topic))
    }
}

/// Store of mutable, signed pointers: at most one live payload
///  per (address, topic). Writes overwrite, they never append.
///
/// Implementations only need atomic visibility of a whole update;
///  ordering between writers is handled by the channel layer's
///  publishers and change detection by its pollers.
#[async_trait]
pub trait FeedStore: Send + Sync + Debug {
    /// Commit `update` as the live value of `address`/`topic`
    ///
    /// Should fail with the following errors to be considered
    ///  correct:
    /// * `Err(FeedStoreError::AddressMismatch)` - the update key does not own `address`
    /// * `Err(FeedStoreError::InvalidSignature)` - the signature does not verify
    async fn set(
        &self,
        address: Address,
        topic: Topic,
        update: FeedUpdate,
    ) -> Result<(), FeedStoreError>;

    /// Get the live value of `address`/`topic`
    ///
    /// # Returns
    /// * `Ok(Some(update))` - the last committed update
    /// * `Ok(None)` - nothing was ever committed at this slot
    async fn get(&self, address: Address, topic: Topic)
        -> Result<Option<FeedUpdate>, FeedStoreError>;
}
