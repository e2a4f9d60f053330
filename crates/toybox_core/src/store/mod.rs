//! Entity store port: the transactional key-value contract repositories use.
//!
//! # Responsibility
//! - Define the storage-agnostic `EntityStore` / `StoreTransaction` traits.
//! - Provide the fixed set of filters and orderings repositories may ask for.
//! - Convert typed records to and from property maps.
//!
//! # Invariants
//! - Queries are only available outside a transaction; `StoreTransaction`
//!   deliberately has no query method.
//! - A transaction either commits every buffered write or none of them.
//! - Query results with equal sort values keep insertion order.

use crate::db::DbError;
use crate::model::key::{EntityKey, EntityKind, PostId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Infrastructure failures raised by store implementations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Store cannot serve requests right now.
    Unavailable(String),
    /// Transaction was aborted while committing; nothing was written.
    CommitFailed(String),
    /// Record could not be converted to or from its property map.
    Serialization(serde_json::Error),
    /// Persisted data does not match the expected shape.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
            Self::CommitFailed(message) => write!(f, "transaction commit failed: {message}"),
            Self::Serialization(err) => write!(f, "entity serialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::Unavailable(_) | Self::CommitFailed(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// One stored row: a key plus its property map.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub key: EntityKey,
    pub properties: Map<String, Value>,
}

impl Entity {
    pub fn new(key: EntityKey, properties: Map<String, Value>) -> Self {
        Self { key, properties }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// Typed value struct persisted as an `Entity`.
pub trait Record: Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn key(&self) -> EntityKey;

    fn to_entity(&self) -> StoreResult<Entity> {
        match serde_json::to_value(self)? {
            Value::Object(properties) => Ok(Entity::new(self.key(), properties)),
            other => Err(StoreError::InvalidData(format!(
                "{} record serialized to non-object value `{other}`",
                Self::KIND
            ))),
        }
    }

    fn from_entity(entity: Entity) -> StoreResult<Self> {
        if entity.key.kind() != Self::KIND {
            return Err(StoreError::InvalidData(format!(
                "expected {} entity, got key `{}`",
                Self::KIND,
                entity.key
            )));
        }
        Ok(serde_json::from_value(Value::Object(entity.properties))?)
    }
}

/// Equality filter on one top-level property.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    property: &'static str,
    value: Value,
}

impl Filter {
    pub fn not_deleted() -> Self {
        Self {
            property: "is_deleted",
            value: Value::Bool(false),
        }
    }

    pub fn member_uid(member_uid: &str) -> Self {
        Self {
            property: "member_uid",
            value: Value::String(member_uid.to_string()),
        }
    }

    pub fn post_id(post_id: PostId) -> Self {
        Self {
            property: "post_id",
            value: Value::from(post_id),
        }
    }

    pub fn property(&self) -> &'static str {
        self.property
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        entity.property(self.property) == Some(&self.value)
    }
}

/// Single-property sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    property: &'static str,
    descending: bool,
}

impl Order {
    pub fn votes_total_desc() -> Self {
        Self {
            property: "votes_total",
            descending: true,
        }
    }

    pub fn created_on_desc() -> Self {
        Self {
            property: "created_on",
            descending: true,
        }
    }

    pub fn property(&self) -> &'static str {
        self.property
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }

    /// Compares two entities by this order; missing values sort first.
    pub fn compare(&self, left: &Entity, right: &Entity) -> Ordering {
        let ordering = compare_values(left.property(self.property), right.property(self.property));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Kind-scoped query with pre-declared filters and ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub kind: EntityKind,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Query {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        entity.key.kind() == self.kind && self.filters.iter().all(|filter| filter.matches(entity))
    }
}

/// Read/write handle valid for the duration of one transaction.
pub trait StoreTransaction {
    /// Reads one entity, observing writes already buffered in this transaction.
    fn get(&mut self, key: &EntityKey) -> StoreResult<Option<Entity>>;
    /// Buffers one insert-or-replace; visible to others only after commit.
    fn put(&mut self, entity: Entity) -> StoreResult<()>;
    /// Reserves a fresh numeric id for `kind`.
    fn allocate_id(&mut self, kind: EntityKind) -> StoreResult<i64>;
}

/// Transactional key-value store consumed by repositories.
pub trait EntityStore {
    fn get(&self, key: &EntityKey) -> StoreResult<Option<Entity>>;

    /// Batch lookup; the result is aligned with `keys`.
    fn get_many(&self, keys: &[EntityKey]) -> StoreResult<Vec<Option<Entity>>>;

    fn query(&self, query: &Query) -> StoreResult<Vec<Entity>>;

    /// Runs `work` inside one all-or-nothing transaction.
    ///
    /// Writes are committed only when `work` returns `Ok` and the commit
    /// itself succeeds; otherwise none of them become visible.
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>;
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(a)), Some(Value::Number(b))) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
