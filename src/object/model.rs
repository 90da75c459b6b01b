//! Model - the persisted state of a domain object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifier::Identifier;

pub const TYPE: &str = "type";
pub const NAME: &str = "name";
pub const COMPOSITION: &str = "composition";
pub const MODIFIED: &str = "modified";
pub const PERSISTED: &str = "persisted";

/// A JSON object with typed accessors for the fields the core relies on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Model(Map<String, Value>);

impl Model {
    pub fn new() -> Self {
        Model(Map::new())
    }

    /// Build a model from any JSON value. Non-objects yield an empty model.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Model(map),
            _ => Model::new(),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn type_name(&self) -> Option<&str> {
        self.0.get(TYPE).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get(NAME).and_then(Value::as_str)
    }

    pub fn has_composition(&self) -> bool {
        matches!(self.0.get(COMPOSITION), Some(Value::Array(_)))
    }

    /// Child identifiers in model order. Entries that are not identifiers are skipped.
    pub fn composition(&self) -> Option<Vec<Identifier>> {
        match self.0.get(COMPOSITION) {
            Some(Value::Array(entries)) => Some(
                entries
                    .iter()
                    .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn set_composition(&mut self, children: &[Identifier]) {
        let entries = children
            .iter()
            .map(|id| serde_json::json!({ "namespace": id.namespace, "key": id.key }))
            .collect();
        self.0.insert(COMPOSITION.to_string(), Value::Array(entries));
    }

    pub fn modified(&self) -> Option<i64> {
        self.0.get(MODIFIED).and_then(Value::as_i64)
    }

    pub fn set_modified(&mut self, timestamp: i64) {
        self.0.insert(MODIFIED.to_string(), Value::from(timestamp));
    }

    /// Time of the last successful write; `None` for never-persisted objects.
    pub fn persisted(&self) -> Option<i64> {
        self.0.get(PERSISTED).and_then(Value::as_i64)
    }

    pub fn set_persisted(&mut self, timestamp: i64) {
        self.0.insert(PERSISTED.to_string(), Value::from(timestamp));
    }
}

impl From<Map<String, Value>> for Model {
    fn from(map: Map<String, Value>) -> Self {
        Model(map)
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
