//! Document domain model.
//!
//! # Responsibility
//! - Define the canonical record stored in every collection.
//! - Separate engine-owned bookkeeping (`seq`, `meta`) from caller fields.
//! - Provide typed accessors for the reserved lifecycle fields.
//!
//! # Invariants
//! - `seq` is assigned by the collection engine only; callers never set it.
//! - `id` is the domain identity and is unique within one collection.
//! - `created` is written once; `updatedAt` is refreshed on every save.
//! - `deleted = true` is a tombstone, not a physical removal.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-internal sequence identifier assigned on insert.
pub type SeqId = u64;

/// Domain identifier field name.
pub const ID_FIELD: &str = "id";
/// Creation timestamp field name (epoch milliseconds).
pub const CREATED_FIELD: &str = "created";
/// Last save timestamp field name (epoch milliseconds).
pub const UPDATED_AT_FIELD: &str = "updatedAt";
/// Soft-delete tombstone field name.
pub const DELETED_FIELD: &str = "deleted";

/// Error raised when converting between JSON/entities and documents.
#[derive(Debug)]
pub enum DocumentError {
    /// Documents must be JSON objects.
    NotAnObject(&'static str),
    /// `serde_json` failed to encode or decode an entity.
    Serde(serde_json::Error),
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject(kind) => write!(f, "document must be a JSON object, got {kind}"),
            Self::Serde(err) => write!(f, "document conversion failed: {err}"),
        }
    }
}

impl Error for DocumentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotAnObject(_) => None,
            Self::Serde(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

/// Engine-owned revision bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    /// Incremented on every engine update, starts at 0.
    pub revision: u64,
    /// Engine insert time in epoch milliseconds.
    pub created: i64,
    /// Engine last update time in epoch milliseconds, 0 until first update.
    pub updated: i64,
    /// Meta layout version.
    pub version: u32,
}

impl DocMeta {
    pub(crate) fn fresh(now_ms: i64) -> Self {
        Self {
            revision: 0,
            created: now_ms,
            updated: 0,
            version: 0,
        }
    }
}

/// One stored record: caller fields plus engine bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$seq", default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<SeqId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<DocMeta>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Creates an empty document with no identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a document from a JSON object value.
    ///
    /// # Errors
    /// - Returns `DocumentError::NotAnObject` for non-object JSON.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        match value {
            Value::Object(fields) => Ok(Self {
                seq: None,
                meta: None,
                fields,
            }),
            other => Err(DocumentError::NotAnObject(json_kind(&other))),
        }
    }

    /// Serializes a typed entity into a document.
    pub fn from_entity<T: Serialize>(entity: &T) -> Result<Self, DocumentError> {
        Self::from_value(serde_json::to_value(entity)?)
    }

    /// Deserializes the caller fields into a typed entity.
    pub fn to_entity<T: DeserializeOwned>(&self) -> Result<T, DocumentError> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }

    /// Returns the caller fields as a JSON object value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Resolves a dotted path (`owner.address.city`) through nested objects.
    ///
    /// A path without dots is a plain field lookup. Array segments accept a
    /// numeric index.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn remove_field(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Returns the domain id when it is a non-empty string.
    pub fn id(&self) -> Option<&str> {
        match self.fields.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.fields.insert(ID_FIELD.to_string(), Value::String(id.into()));
    }

    /// Returns whether `id` carries a usable (truthy) value.
    pub fn has_domain_id(&self) -> bool {
        self.fields.get(ID_FIELD).is_some_and(is_truthy)
    }

    pub fn created(&self) -> Option<i64> {
        self.fields.get(CREATED_FIELD).and_then(Value::as_i64)
    }

    pub fn updated_at(&self) -> Option<i64> {
        self.fields.get(UPDATED_AT_FIELD).and_then(Value::as_i64)
    }

    /// Absent or non-boolean `deleted` means "not deleted".
    pub fn is_deleted(&self) -> bool {
        matches!(self.fields.get(DELETED_FIELD), Some(Value::Bool(true)))
    }

    /// Sets the soft-delete tombstone.
    pub fn mark_deleted(&mut self) {
        self.fields
            .insert(DELETED_FIELD.to_string(), Value::Bool(true));
    }

    /// Clears the soft-delete tombstone.
    pub fn restore(&mut self) {
        self.fields.remove(DELETED_FIELD);
    }

    /// Returns whether the engine has already stored this document.
    pub fn is_stored(&self) -> bool {
        self.seq.is_some()
    }
}

/// JavaScript-style truthiness over JSON values.
///
/// `null`, `false`, `0`, `NaN` and `""` are falsy; everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
