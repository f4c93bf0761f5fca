//! Addressing and key derivation
//!
//! Pure functions that turn key material into feed coordinates:
//!
//! ```text
//! address(pubkey)            = blake3(pubkey)[..20]
//! shared_secret(a.sk, b.pk)  = x25519(a.sk, b.pk) == x25519(b.sk, a.pk)
//! topic(secret, name)        = blake3(secret || name)
//! topic(None, name)          = name, zero padded to 32 bytes
//! topic(None, None)          = [0; 32]
//! ```
//!
//! Hashing the shared secret into the topic means an observer who sees a feed
//! update cannot tell which pair of public keys it belongs to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::keys::{PublicKey, SecretKey, PUBLIC_KEY_HEX_LEN};
use super::secret::Secret;

/// Size of an address in bytes
pub const ADDRESS_SIZE: usize = 20;
/// Length of a hex encoded address
pub const ADDRESS_HEX_LEN: usize = ADDRESS_SIZE * 2;
/// Size of a topic in bytes
pub const TOPIC_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum DeriveError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Short public identifier of a key pair, the "slot" of its feeds
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self, DeriveError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; ADDRESS_SIZE];
        hex::decode_to_slice(hex, &mut buff).map_err(|_| {
            DeriveError::InvalidParameters(format!("'{}' is not a valid address", hex))
        })?;
        Ok(Address(buff))
    }
}

impl From<&PublicKey> for Address {
    fn from(key: &PublicKey) -> Self {
        address(key)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = DeriveError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        Address::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Fixed-length identifier scoping a feed slot to one channel
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Topic([u8; TOPIC_SIZE]);

impl Topic {
    pub fn as_bytes(&self) -> &[u8; TOPIC_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({})", self.to_hex())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Reference to the other side of a channel
///
/// Readers may only know a writer's address (public channels), but every
/// encrypted channel needs the full public key to derive the shared secret.
/// Parsed from 64 hex characters (public key) or 40 hex characters (address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerId {
    Key(PublicKey),
    Address(Address),
}

impl PeerId {
    pub fn address(&self) -> Address {
        match self {
            PeerId::Key(key) => address(key),
            PeerId::Address(address) => *address,
        }
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        match self {
            PeerId::Key(key) => Some(key),
            PeerId::Address(_) => None,
        }
    }

    /// The public key, or `InvalidParameters` naming the role the key was needed for
    pub fn require_key(&self, role: &str) -> Result<&PublicKey, DeriveError> {
        self.public_key().ok_or_else(|| {
            DeriveError::InvalidParameters(format!(
                "{} must be a public key to derive the shared key, got address {}",
                role,
                self.address()
            ))
        })
    }
}

impl From<PublicKey> for PeerId {
    fn from(key: PublicKey) -> Self {
        PeerId::Key(key)
    }
}

impl From<&PublicKey> for PeerId {
    fn from(key: &PublicKey) -> Self {
        PeerId::Key(*key)
    }
}

impl From<Address> for PeerId {
    fn from(address: Address) -> Self {
        PeerId::Address(address)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerId::Key(key) => fmt::Display::fmt(key, f),
            PeerId::Address(address) => fmt::Display::fmt(address, f),
        }
    }
}

impl FromStr for PeerId {
    type Err = DeriveError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").unwrap_or(s);
        match hex.len() {
            PUBLIC_KEY_HEX_LEN => PublicKey::from_hex(hex).map(PeerId::Key).map_err(|_| {
                DeriveError::InvalidParameters(format!("'{}' is not a valid public key", s))
            }),
            ADDRESS_HEX_LEN => Address::from_hex(hex).map(PeerId::Address),
            _ => Err(DeriveError::InvalidParameters(format!(
                "'{}' is neither a public key nor an address",
                s
            ))),
        }
    }
}

/// Derive the address of a public key
pub fn address(key: &PublicKey) -> Address {
    let hash = blake3::hash(&key.to_bytes());
    let mut buff = [0; ADDRESS_SIZE];
    buff.copy_from_slice(&hash.as_bytes()[..ADDRESS_SIZE]);
    Address(buff)
}

/// Derive the symmetric secret shared by `secret_key` and the owner of `other`
///
/// Commutative: `shared_secret(a, b.public()) == shared_secret(b, a.public())`.
/// The raw X25519 output is the secret, no hash is applied on top.
pub fn shared_secret(secret_key: &SecretKey, other: &PublicKey) -> Result<Secret, DeriveError> {
    let other = other
        .to_x25519()
        .map_err(|e| DeriveError::InvalidParameters(e.to_string()))?;
    let shared = secret_key.to_x25519().diffie_hellman(&other);
    if !shared.was_contributory() {
        return Err(DeriveError::InvalidParameters(
            "public key is a low order point".to_string(),
        ));
    }
    Ok(Secret::from(*shared.as_bytes()))
}

/// Derive the topic of a channel
pub fn topic(secret: Option<&Secret>, name: Option<&str>) -> Result<Topic, DeriveError> {
    match (secret, name) {
        (Some(secret), name) => {
            let mut hasher = blake3::Hasher::new();
            hasher.update(secret.bytes());
            hasher.update(name.unwrap_or_default().as_bytes());
            Ok(Topic(*hasher.finalize().as_bytes()))
        }
        (None, Some(name)) => {
            let bytes = name.as_bytes();
            if bytes.len() > TOPIC_SIZE {
                return Err(DeriveError::InvalidParameters(format!(
                    "topic name '{}' is longer than {} bytes",
                    name, TOPIC_SIZE
                )));
            }
            let mut buff = [0; TOPIC_SIZE];
            buff[..bytes.len()].copy_from_slice(bytes);
            Ok(Topic(buff))
        }
        (None, None) => Ok(Topic::default()),
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_shared_secret_is_commutative() {
        for _ in 0..8 {
            let alice = SecretKey::generate();
            let bob = SecretKey::generate();

            let ab = shared_secret(&alice, &bob.public()).unwrap();
            let ba = shared_secret(&bob, &alice.public()).unwrap();
            assert_eq!(ab, ba);
        }
    }

    #[test]
    fn test_shared_secret_is_raw_diffie_hellman() {
        let alice = SecretKey::generate();
        let bob = SecretKey::generate();

        let raw = alice
            .to_x25519()
            .diffie_hellman(&bob.public().to_x25519().unwrap());
        let shared = shared_secret(&alice, &bob.public()).unwrap();
        assert_eq!(shared.bytes(), raw.as_bytes());
    }

    #[test]
    fn test_shared_secret_differs_per_pair() {
        let alice = SecretKey::generate();
        let bob = SecretKey::generate();
        let chloe = SecretKey::generate();

        let ab = shared_secret(&alice, &bob.public()).unwrap();
        let ac = shared_secret(&alice, &chloe.public()).unwrap();
        assert_ne!(ab, ac);
    }

    #[test]
    fn test_topic_stable_and_distinct() {
        let keys: Vec<SecretKey> = (0..3).map(|_| SecretKey::generate()).collect();
        let other = SecretKey::generate().public();
        let secrets: Vec<Secret> = keys
            .iter()
            .map(|key| shared_secret(key, &other).unwrap())
            .collect();
        let names = [None, Some("files"), Some("contact"), Some("first-contact")];

        let mut seen = HashSet::new();
        for secret in &secrets {
            for name in names {
                let first = topic(Some(secret), name).unwrap();
                let again = topic(Some(secret), name).unwrap();
                assert_eq!(first, again);
                assert!(seen.insert(first), "topic collision");
            }
        }
        assert_eq!(seen.len(), secrets.len() * names.len());
    }

    #[test]
    fn test_public_topic_is_name() {
        let t = topic(None, Some("actor")).unwrap();
        assert_eq!(&t.as_bytes()[..5], b"actor");
        assert!(t.as_bytes()[5..].iter().all(|b| *b == 0));

        assert_eq!(topic(None, None).unwrap(), Topic::default());

        let long = "x".repeat(TOPIC_SIZE + 1);
        assert!(matches!(
            topic(None, Some(&long)),
            Err(DeriveError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_address_is_deterministic() {
        let key = SecretKey::generate().public();
        assert_eq!(address(&key), address(&key));
        assert_ne!(address(&key), address(&SecretKey::generate().public()));
        assert_eq!(address(&key).to_hex().len(), ADDRESS_HEX_LEN);
    }

    #[test]
    fn test_peer_id_parsing() {
        let key = SecretKey::generate().public();

        let parsed: PeerId = key.to_hex().parse().unwrap();
        assert_eq!(parsed, PeerId::Key(key));

        let parsed: PeerId = address(&key).to_hex().parse().unwrap();
        assert_eq!(parsed, PeerId::Address(address(&key)));
        assert!(matches!(
            parsed.require_key("writer"),
            Err(DeriveError::InvalidParameters(_))
        ));

        assert!("not-a-key".parse::<PeerId>().is_err());
        assert!("zz".repeat(32).parse::<PeerId>().is_err());
    }
}
