//! Generic entity record shared by every partition.
//!
//! # Responsibility
//! - Define the field map shape used by seed data, overlay storage and CSV.
//! - Own the JSON object encoding of one record.
//!
//! # Invariants
//! - `id` is opaque and unique within a partition.
//! - `created_at` always holds canonical ISO-8601 text once constructed.
//! - `fields` never contains the reserved `id` or `createdAt` keys.

use crate::model::timestamp::{normalize, now_iso, RawTimestamp};
use serde::de::{Deserializer, Error as _};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Reserved JSON key holding the record identifier.
pub const ID_FIELD: &str = "id";
/// Reserved JSON key holding the creation timestamp.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Opaque record identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RecordId(String);

impl RecordId {
    /// Generates a fresh id.
    ///
    /// UUIDv7 embeds a millisecond timestamp next to random bits, so ids stay
    /// unique without any shared counter.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Scalar value stored under one named field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Converts a stored JSON value.
    ///
    /// Nested arrays/objects are kept as their compact JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => Self::Integer(integer),
                None => Self::Number(number.as_f64().unwrap_or_default()),
            },
            Value::String(text) => Self::Text(text.clone()),
            nested => Self::Text(nested.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Integer(integer) => Value::Number((*integer).into()),
            Self::Number(number) => Number::from_f64(*number).map_or(Value::Null, Value::Number),
            Self::Text(text) => Value::String(text.clone()),
        }
    }

    /// Stringifies the value for delimited text; `Null` becomes empty.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(flag) => flag.to_string(),
            Self::Integer(integer) => integer.to_string(),
            Self::Number(number) => number.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One entity of any partition: identity, creation time and named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub created_at: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Creates an empty record with a generated id and the current time.
    pub fn new() -> Self {
        Self::with_id(RecordId::generate())
    }

    /// Creates an empty record with a caller-provided id.
    pub fn with_id(id: RecordId) -> Self {
        Self {
            id,
            created_at: now_iso(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter. Reserved keys are routed to `id` and
    /// `created_at`.
    pub fn field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        match name {
            ID_FIELD => self.id = RecordId::new(value.to_text()),
            CREATED_AT_FIELD => {
                self.created_at = normalize(&RawTimestamp::from_text(&value.to_text()));
            }
            _ => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns the stringified value of one field, or `None` when absent/null.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name) {
            None | Some(FieldValue::Null) => None,
            Some(value) => Some(value.to_text()),
        }
    }

    /// Builds a record from one stored JSON object.
    ///
    /// `createdAt` accepts every legacy timestamp shape and is normalized
    /// here. A missing or empty `id` is replaced by a generated one.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let id = Self::stored_id(object).unwrap_or_else(RecordId::generate);
        let created_at = object
            .get(CREATED_AT_FIELD)
            .map_or(RawTimestamp::Missing, RawTimestamp::from_json);

        let fields = object
            .iter()
            .filter(|(key, _)| key.as_str() != ID_FIELD && key.as_str() != CREATED_AT_FIELD)
            .map(|(key, value)| (key.clone(), FieldValue::from_json(value)))
            .collect();

        Self {
            id,
            created_at: normalize(&created_at),
            fields,
        }
    }

    /// Id carried by a stored object: a non-blank string or a number.
    pub fn stored_id(object: &Map<String, Value>) -> Option<RecordId> {
        match object.get(ID_FIELD) {
            Some(Value::String(text)) if !text.trim().is_empty() => {
                Some(RecordId::new(text.clone()))
            }
            Some(Value::Number(number)) => Some(RecordId::new(number.to_string())),
            _ => None,
        }
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 2))?;
        map.serialize_entry(ID_FIELD, self.id.as_str())?;
        map.serialize_entry(CREATED_AT_FIELD, &self.created_at)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, &value.to_json())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(object) => Ok(Self::from_object(&object)),
            other => Err(D::Error::custom(format!(
                "expected record object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
