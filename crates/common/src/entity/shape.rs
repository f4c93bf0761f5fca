use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::crypto::{PublicKey, ADDRESS_SIZE};

/// Longest mailbox name accepted in a mailboxes record
pub const MAILBOX_NAME_MAX_LEN: usize = 50;

static MAILBOX_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-zA-Z_. -]{1,50}$").unwrap());

/// Constraint on the contents of a JSON string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// 64 hex chars naming a valid Ed25519 point
    PublicKey,
    /// 40 hex chars
    Address,
    /// 64 hex chars, a BLAKE3 content hash
    Hash,
    /// 64 hex chars, a symmetric key
    SecretKey,
    /// starts with `/`
    AbsolutePath,
    /// `[0-9a-zA-Z-_. ]{1,50}`
    MailboxName,
}

impl Format {
    pub fn check(&self, value: &str) -> bool {
        match self {
            Format::PublicKey => PublicKey::from_hex(value).is_ok(),
            Format::Address => is_hex(value, ADDRESS_SIZE * 2),
            Format::Hash | Format::SecretKey => is_hex(value, 64),
            Format::AbsolutePath => value.starts_with('/'),
            Format::MailboxName => MAILBOX_NAME_REGEX.is_match(value),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::PublicKey => "public key",
            Format::Address => "address",
            Format::Hash => "content hash",
            Format::SecretKey => "secret key",
            Format::AbsolutePath => "absolute path",
            Format::MailboxName => "mailbox name",
        };
        write!(f, "{}", name)
    }
}

fn is_hex(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A field of an object shape
#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub shape: Shape,
    pub required: bool,
}

/// Declared shape of an entity payload.
///  A deliberately small subset of JSON schema: enough to reject
///  payloads that are missing fields, carry the wrong types,
///  or exceed length limits.
#[derive(Debug, Clone)]
pub enum Shape {
    /// Anything goes
    Any,
    String {
        min_len: Option<usize>,
        max_len: Option<usize>,
        format: Option<Format>,
    },
    Number,
    Bool,
    Array(Box<Shape>),
    /// Homogeneous map with constrained keys
    Map {
        keys: Option<Format>,
        values: Box<Shape>,
    },
    Object {
        fields: Vec<Field>,
        /// Whether fields not listed are accepted
        additional: bool,
    },
}

/// Where and why a value failed its shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub reason: String,
}

impl Violation {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            reason: reason.into(),
        }
    }
}

impl Shape {
    pub fn string() -> Self {
        Shape::String {
            min_len: None,
            max_len: None,
            format: None,
        }
    }

    pub fn formatted(format: Format) -> Self {
        Shape::String {
            min_len: None,
            max_len: None,
            format: Some(format),
        }
    }

    pub fn array(items: Shape) -> Self {
        Shape::Array(Box::new(items))
    }

    pub fn map(keys: Option<Format>, values: Shape) -> Self {
        Shape::Map {
            keys,
            values: Box::new(values),
        }
    }

    /// An object that accepts no undeclared fields
    pub fn object() -> Self {
        Shape::Object {
            fields: Vec::new(),
            additional: false,
        }
    }

    /// Bound the length (in chars) of a string shape
    pub fn max_len(mut self, max: usize) -> Self {
        if let Shape::String { max_len, .. } = &mut self {
            *max_len = Some(max);
        }
        self
    }

    pub fn min_len(mut self, min: usize) -> Self {
        if let Shape::String { min_len, .. } = &mut self {
            *min_len = Some(min);
        }
        self
    }

    pub fn required(self, name: &'static str, shape: Shape) -> Self {
        self.field(name, shape, true)
    }

    pub fn optional(self, name: &'static str, shape: Shape) -> Self {
        self.field(name, shape, false)
    }

    /// Let an object shape accept fields it does not declare
    pub fn allow_additional(mut self) -> Self {
        if let Shape::Object { additional, .. } = &mut self {
            *additional = true;
        }
        self
    }

    fn field(mut self, name: &'static str, shape: Shape, required: bool) -> Self {
        if let Shape::Object { fields, .. } = &mut self {
            fields.push(Field {
                name,
                shape,
                required,
            });
        }
        self
    }

    /// Check `value` against this shape
    pub fn validate(&self, value: &Value) -> Result<(), Violation> {
        self.validate_at(value, "")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), Violation> {
        match (self, value) {
            (Shape::Any, _) => Ok(()),
            (
                Shape::String {
                    min_len,
                    max_len,
                    format,
                },
                Value::String(s),
            ) => {
                let len = s.chars().count();
                if let Some(min) = min_len {
                    if len < *min {
                        return Err(Violation::new(
                            path,
                            format!("must be at least {} characters", min),
                        ));
                    }
                }
                if let Some(max) = max_len {
                    if len > *max {
                        return Err(Violation::new(
                            path,
                            format!("must be at most {} characters", max),
                        ));
                    }
                }
                match format {
                    Some(format) if !format.check(s) => {
                        Err(Violation::new(path, format!("not a valid {}", format)))
                    }
                    _ => Ok(()),
                }
            }
            (Shape::Number, Value::Number(_)) => Ok(()),
            (Shape::Bool, Value::Bool(_)) => Ok(()),
            (Shape::Array(items), Value::Array(values)) => {
                for (i, item) in values.iter().enumerate() {
                    items.validate_at(item, &format!("{}/{}", path, i))?;
                }
                Ok(())
            }
            (Shape::Map { keys, values }, Value::Object(map)) => {
                for (key, value) in map {
                    let child = format!("{}/{}", path, key);
                    if let Some(format) = keys {
                        if !format.check(key) {
                            return Err(Violation::new(
                                &child,
                                format!("key is not a valid {}", format),
                            ));
                        }
                    }
                    values.validate_at(value, &child)?;
                }
                Ok(())
            }
            (Shape::Object { fields, additional }, Value::Object(map)) => {
                for field in fields {
                    let child = format!("{}/{}", path, field.name);
                    match map.get(field.name) {
                        // null stands in for an absent optional field
                        None | Some(Value::Null) if field.required => {
                            return Err(Violation::new(&child, "is required"));
                        }
                        None | Some(Value::Null) => {}
                        Some(value) => field.shape.validate_at(value, &child)?,
                    }
                }
                if !additional {
                    if let Some(unknown) = map
                        .keys()
                        .find(|key| !fields.iter().any(|f| f.name == key.as_str()))
                    {
                        return Err(Violation::new(
                            &format!("{}/{}", path, unknown),
                            "is not allowed",
                        ));
                    }
                }
                Ok(())
            }
            (shape, value) => Err(Violation::new(
                path,
                format!("expected {}, found {}", shape.kind(), kind_of(value)),
            )),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Shape::Any => "any",
            Shape::String { .. } => "string",
            Shape::Number => "number",
            Shape::Bool => "boolean",
            Shape::Array(_) => "array",
            Shape::Map { .. } | Shape::Object { .. } => "object",
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
