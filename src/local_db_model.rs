//! Record types stored in collection slots.
//!
//! A [`Record`] is a flat mapping of field names to primitive JSON values
//! (strings, numbers, booleans and `null`). Students, books and lending
//! transactions all use the same shape; the collection decides which fields
//! are searched and how ids are assigned.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::app_response::AppResponse;

/// Name of the identifier field shared by every collection.
pub const ID_FIELD: &str = "id";

/// Typed identifier of a record inside one collection.
///
/// Links between collections (a lending's `studentId`) are plain strings in
/// storage; wrapping them here makes lookups explicit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
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
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One student, book or lending transaction.
///
/// ```rust
/// use library_desk_core::local_db_model::Record;
/// use serde_json::json;
///
/// let record = Record::from_value(json!({"id": "B1", "title": "Alpha", "copies": 3}))?;
/// assert_eq!(record.id().unwrap().as_str(), "B1");
/// assert_eq!(record.text("title"), Some("Alpha".to_string()));
/// # Ok::<(), library_desk_core::app_response::AppResponse>(())
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, JsonValue>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a record from a JSON object, rejecting nested objects and arrays.
    pub fn from_value(value: JsonValue) -> Result<Self, AppResponse> {
        match value {
            JsonValue::Object(map) => {
                let record = Self(map);
                record.ensure_flat()?;
                Ok(record)
            }
            other => Err(AppResponse::ValidationError(format!(
                "Record must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, AppResponse> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn ensure_flat(&self) -> Result<(), AppResponse> {
        for (field, value) in &self.0 {
            if value.is_object() || value.is_array() {
                return Err(AppResponse::ValidationError(format!(
                    "Field '{field}' holds {}; records only hold primitive values",
                    json_kind(value)
                )));
            }
        }
        Ok(())
    }

    /// The record id as text. Hosts send both `"S-1"` and `7`; a number is
    /// identified by its rendering. Missing, `null` and blank ids are `None`.
    pub fn id(&self) -> Option<RecordId> {
        match self.0.get(ID_FIELD) {
            Some(JsonValue::String(id)) if !id.trim().is_empty() => Some(RecordId::new(id.clone())),
            Some(JsonValue::Number(n)) => Some(RecordId::new(n.to_string())),
            _ => None,
        }
    }

    /// Rejects an `id` that is neither a string, a number nor `null`.
    pub fn check_id(&self) -> Result<(), AppResponse> {
        match self.0.get(ID_FIELD) {
            None | Some(JsonValue::Null) | Some(JsonValue::String(_)) | Some(JsonValue::Number(_)) => Ok(()),
            Some(other) => Err(AppResponse::ValidationError(format!(
                "Field '{ID_FIELD}' must be a string or a number, got {}",
                json_kind(other)
            ))),
        }
    }

    pub fn set_id(&mut self, id: &RecordId) {
        self.0.insert(ID_FIELD.to_string(), JsonValue::String(id.as_str().to_string()));
    }

    pub fn has_id(&self, id: &RecordId) -> bool {
        self.id().is_some_and(|own| own == *id)
    }

    pub fn remove(&mut self, field: &str) -> Option<JsonValue> {
        self.0.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.insert(field.into(), value.into());
    }

    /// Text rendering of a field; `None` for missing or `null` values.
    pub fn text(&self, field: &str) -> Option<String> {
        self.0.get(field).and_then(render_value)
    }

    /// True when the field is missing, `null`, or a blank string.
    pub fn is_blank(&self, field: &str) -> bool {
        match self.0.get(field) {
            None | Some(JsonValue::Null) => true,
            Some(JsonValue::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.0)
    }
}

/// String form used by search and by the mixed-type sort fallback.
pub fn render_value(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
