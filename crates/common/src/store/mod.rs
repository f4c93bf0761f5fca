mod blobs_store;

pub use blobs_store::{BlobsStore, BlobsStoreError};
pub use iroh_blobs::Hash;

/// Parse a content hash from its 64 character hex form
pub fn parse_hash(hex: &str) -> Option<Hash> {
    let mut buff = [0u8; 32];
    hex::decode_to_slice(hex, &mut buff).ok()?;
    Some(Hash::from_bytes(buff))
}

/// Serde helpers that write content hashes as plain hex strings
///  inside JSON entities, e.g. `#[serde(with = "crate::store::hash_hex")]`
pub mod hash_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{parse_hash, Hash};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash.as_bytes()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let hex = String::deserialize(deserializer)?;
        parse_hash(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid content hash '{}'", hex)))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::super::{parse_hash, Hash};

        pub fn serialize<S: Serializer>(
            hash: &Option<Hash>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match hash {
                Some(hash) => serializer.serialize_some(&hex::encode(hash.as_bytes())),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Hash>, D::Error> {
            let Some(hex) = Option::<String>::deserialize(deserializer)? else {
                return Ok(None);
            };
            parse_hash(&hex)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid content hash '{}'", hex)))
        }
    }
}
