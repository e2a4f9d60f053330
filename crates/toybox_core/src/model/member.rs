//! Member domain model.
//!
//! # Invariants
//! - `slug` is assigned once at creation and never rewritten.
//! - `version` starts at 1 and grows by exactly 1 per settings update.

use crate::model::key::{EntityKey, EntityKind};
use crate::model::EMPTY_PAYLOAD;
use crate::store::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Per-identity settings holder, created on first access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// External identity string; also the entity key id.
    pub uid: String,
    /// Opaque public identifier safe to show to other members.
    pub slug: Uuid,
    /// Settings blob as JSON text.
    pub data: String,
    pub created_on: i64,
    pub updated_on: Option<i64>,
    /// Optimistic-concurrency version, exposed to callers as the ETag.
    pub version: i64,
}

impl Member {
    /// Creates a first-version member with empty settings.
    pub fn new(uid: impl Into<String>, now: i64) -> Self {
        Self {
            uid: uid.into(),
            slug: Uuid::new_v4(),
            data: EMPTY_PAYLOAD.to_string(),
            created_on: now,
            updated_on: None,
            version: 1,
        }
    }

    /// Returns the next version carrying `data`.
    pub fn with_data(&self, data: String, now: i64) -> Self {
        Self {
            data,
            updated_on: Some(now),
            version: self.version + 1,
            ..self.clone()
        }
    }

    /// Parses the settings blob.
    pub fn settings(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

impl Record for Member {
    const KIND: EntityKind = EntityKind::Member;

    fn key(&self) -> EntityKey {
        EntityKey::member(&self.uid)
    }
}
