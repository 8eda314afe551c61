//! Record values
//!
//! Repositories exchange open, string-keyed maps of JSON values. Panels
//! that know their row shape convert through [`record_from`] and
//! [`record_into`].

use crate::error::{AdminError, AdminResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// A single row as seen by panels and repositories
pub type Record = Map<String, Value>;

/// Typed accessors over [`Record`]
pub trait RecordExt {
    fn str_field(&self, key: &str) -> Option<&str>;

    /// Field rendered as a string, accepting numbers and booleans
    fn string_field(&self, key: &str) -> Option<String>;

    fn bool_field(&self, key: &str) -> Option<bool>;

    fn record_id(&self) -> Option<String> {
        self.string_field("id")
    }
}

impl RecordExt for Record {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn string_field(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn bool_field(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            _ => None,
        }
    }
}

/// Serialize a typed row into a record.
pub fn record_from<T: Serialize>(value: &T) -> AdminResult<Record> {
    match serde_json::to_value(value).map_err(|e| AdminError::internal(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(AdminError::internal(format!(
            "expected an object, got {}",
            type_name(&other)
        ))),
    }
}

/// Deserialize a record into a typed row.
pub fn record_into<T: DeserializeOwned>(record: Record) -> AdminResult<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
