//! Document wire shape for document-oriented backends.
//!
//! ```json
//! { "_id": "...", "_rev": "2-…", "_deleted": false,
//!   "metadata": { "category": "domain object", "type": "folder",
//!                 "owner": "...", "name": "...", "created": 1700000000000 },
//!   "model": { ... } }
//! ```

use serde::{Deserialize, Serialize};

use super::PersistedRecord;
use crate::object::{now_millis, Model};

pub const CATEGORY: &str = "domain object";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub category: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub owner: String,
    pub name: String,
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(rename = "_deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,
    pub metadata: DocumentMetadata,
    pub model: Model,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl DocumentRecord {
    /// A fresh, unrevised document for `model`.
    pub fn new(id: impl Into<String>, model: Model, owner: impl Into<String>) -> Self {
        let metadata = DocumentMetadata {
            category: CATEGORY.to_string(),
            type_name: model.type_name().unwrap_or_default().to_string(),
            owner: owner.into(),
            name: model.name().unwrap_or_default().to_string(),
            created: now_millis(),
        };
        DocumentRecord {
            id: id.into(),
            rev: None,
            deleted: false,
            metadata,
            model,
        }
    }

    /// The numeric generation prefix of `_rev` (`0` when unrevised).
    pub fn generation(&self) -> u64 {
        self.rev
            .as_deref()
            .and_then(|rev| rev.split('-').next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }

    /// Advance `_rev` to the next `N-<hex>` revision.
    pub fn bump_revision(&mut self) {
        let next = self.generation() + 1;
        self.rev = Some(format!("{}-{}", next, uuid::Uuid::new_v4().simple()));
    }

    /// Replace the model, keeping metadata in step with it.
    pub fn set_model(&mut self, model: Model) {
        if let Some(type_name) = model.type_name() {
            self.metadata.type_name = type_name.to_string();
        }
        if let Some(name) = model.name() {
            self.metadata.name = name.to_string();
        }
        self.model = model;
    }

    pub fn to_record(&self) -> PersistedRecord {
        PersistedRecord {
            id: self.id.clone(),
            persisted: self.model.persisted(),
            rev: self.rev.clone(),
            model: self.model.clone(),
        }
    }
}
