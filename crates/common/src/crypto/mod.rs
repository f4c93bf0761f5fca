//! Cryptographic primitives for parley
//!
//! - **Identity & Authentication**: Ed25519 key pairs sign every feed update
//! - **Encryption**: ChaCha20-Poly1305 for channel payloads and file contents
//! - **Key Agreement**: ECDH over X25519 (converted from the Ed25519 keys)
//! - **Addressing**: BLAKE3 derived addresses and topics
//!
//! # Channel Model
//!
//! Two parties who each hold their own key pair and the other's public key
//! can independently compute the same [`Secret`] with [`shared_secret`]. That
//! secret both encrypts the channel and is hashed into its [`Topic`], so the
//! channel is only discoverable by the two of them:
//!
//! 1. Writer derives `secret = shared_secret(writer.sk, reader.pk)`
//! 2. Writer publishes at `(address(writer.pk), topic(secret, name))`
//! 3. Reader derives `secret = shared_secret(reader.sk, writer.pk)`
//! 4. Reader looks up the same coordinates and decrypts with the same secret

mod derive;
mod keys;
mod secret;

pub use derive::{
    address, shared_secret, topic, Address, DeriveError, PeerId, Topic, ADDRESS_SIZE, TOPIC_SIZE,
};
pub use ed25519_dalek::Signature;
pub use keys::{KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE};
pub use secret::{Secret, SecretError, ALGORITHM, SECRET_SIZE};
