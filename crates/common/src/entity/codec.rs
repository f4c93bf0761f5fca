use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::registry::{Registry, ValidationError};
use crate::crypto::Secret;

/// A typed payload with a registered shape
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type id the shape is registered under
    const TYPE: &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// Refused to encode a payload that does not match its shape
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Stored bytes could not be turned back into the entity:
    ///  wrong or missing key, malformed JSON, unexpected type
    ///  or a shape violation
    #[error("failed to decode entity: {0}")]
    Decode(String),
}

/// The envelope every entity is stored in:
///  `{"type": <type id>, "data": <payload>}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub data: Value,
}

/// Validates, serializes and (optionally) encrypts entities
#[derive(Debug, Clone)]
pub struct EntityCodec {
    registry: Arc<Registry>,
}

impl Default for EntityCodec {
    fn default() -> Self {
        Self::new(Registry::default())
    }
}

impl EntityCodec {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Wrap an entity in its envelope, validating it first
    pub fn to_raw<T: Entity>(&self, data: &T) -> Result<RawEntity, EntityError> {
        let data = serde_json::to_value(data).map_err(|e| ValidationError {
            entity_type: T::TYPE.to_string(),
            path: "/".to_string(),
            reason: e.to_string(),
        })?;
        self.registry.validate(T::TYPE, &data)?;
        Ok(RawEntity {
            entity_type: T::TYPE.to_string(),
            data,
        })
    }

    /// Unwrap an envelope into `T`, checking its type and shape
    pub fn from_raw<T: Entity>(&self, raw: RawEntity) -> Result<T, EntityError> {
        if raw.entity_type != T::TYPE {
            return Err(EntityError::Decode(format!(
                "expected entity of type {}, found {}",
                T::TYPE,
                raw.entity_type
            )));
        }
        self.registry
            .validate(T::TYPE, &raw.data)
            .map_err(|e| EntityError::Decode(e.to_string()))?;
        serde_json::from_value(raw.data).map_err(|e| EntityError::Decode(e.to_string()))
    }

    /// Encode an untyped payload under `entity_type`
    pub fn encode_raw(
        &self,
        entity_type: &str,
        data: Value,
        key: Option<&Secret>,
    ) -> Result<Vec<u8>, EntityError> {
        self.registry.validate(entity_type, &data)?;
        let raw = RawEntity {
            entity_type: entity_type.to_string(),
            data,
        };
        seal(&raw, key)
    }

    /// Decode bytes into a validated envelope of any registered type
    pub fn decode_raw(&self, bytes: &[u8], key: Option<&Secret>) -> Result<RawEntity, EntityError> {
        let raw: RawEntity = open(bytes, key)?;
        self.registry
            .validate(&raw.entity_type, &raw.data)
            .map_err(|e| EntityError::Decode(e.to_string()))?;
        Ok(raw)
    }

    pub fn encode<T: Entity>(
        &self,
        data: &T,
        key: Option<&Secret>,
    ) -> Result<Vec<u8>, EntityError> {
        let raw = self.to_raw(data)?;
        seal(&raw, key)
    }

    pub fn decode<T: Entity>(
        &self,
        bytes: &[u8],
        key: Option<&Secret>,
    ) -> Result<T, EntityError> {
        let raw: RawEntity = open(bytes, key)?;
        self.from_raw(raw)
    }
}

/// Serialize `value` as JSON, encrypting it when a key is given
pub(crate) fn seal<S: Serialize>(value: &S, key: Option<&Secret>) -> Result<Vec<u8>, EntityError> {
    let json = serde_json::to_vec(value).map_err(|e| EntityError::Decode(e.to_string()))?;
    match key {
        Some(key) => key
            .encrypt(&json)
            .map_err(|e| EntityError::Decode(e.to_string())),
        None => Ok(json),
    }
}

/// Inverse of [`seal`]
pub(crate) fn open<D: DeserializeOwned>(
    bytes: &[u8],
    key: Option<&Secret>,
) -> Result<D, EntityError> {
    let json = match key {
        Some(key) => key
            .decrypt(bytes)
            .map_err(|e| EntityError::Decode(format!("decryption failed: {}", e)))?,
        None => bytes.to_vec(),
    };
    serde_json::from_slice(&json).map_err(|e| EntityError::Decode(e.to_string()))
}
