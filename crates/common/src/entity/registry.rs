use std::collections::HashMap;

use serde_json::Value;

use super::schema;
use super::shape::Shape;

/// A payload did not match the shape registered for its type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {entity_type} at {path}: {reason}")]
pub struct ValidationError {
    pub entity_type: String,
    pub path: String,
    pub reason: String,
}

/// Maps entity type ids to their shapes.
///  Fill it before sharing it; once wrapped in an `Arc`
///  by the codec it is read-only.
#[derive(Debug, Clone)]
pub struct Registry {
    shapes: HashMap<String, Shape>,
}

impl Default for Registry {
    /// A registry holding every built-in protocol entity
    fn default() -> Self {
        let mut registry = Self::empty();
        for (entity_type, shape) in schema::builtin() {
            registry.register(entity_type, shape);
        }
        registry
    }
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            shapes: HashMap::new(),
        }
    }

    /// Register (or replace) the shape for `entity_type`
    pub fn register(&mut self, entity_type: impl Into<String>, shape: Shape) -> &mut Self {
        self.shapes.insert(entity_type.into(), shape);
        self
    }

    pub fn get(&self, entity_type: &str) -> Option<&Shape> {
        self.shapes.get(entity_type)
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.shapes.contains_key(entity_type)
    }

    /// Validate `data` against the shape registered for `entity_type`.
    ///  Unregistered types never validate.
    pub fn validate(&self, entity_type: &str, data: &Value) -> Result<(), ValidationError> {
        let shape = self.get(entity_type).ok_or_else(|| ValidationError {
            entity_type: entity_type.to_string(),
            path: "/".to_string(),
            reason: "unknown entity type".to_string(),
        })?;

        shape.validate(data).map_err(|violation| ValidationError {
            entity_type: entity_type.to_string(),
            path: violation.path,
            reason: violation.reason,
        })
    }
}
