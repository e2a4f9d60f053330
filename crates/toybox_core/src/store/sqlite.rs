//! SQLite-backed entity store.
//!
//! # Responsibility
//! - Persist entities as JSON property maps in one `entities` table.
//! - Translate pre-declared filters/orderings into `json_extract` SQL.
//!
//! # Invariants
//! - Every transaction is `BEGIN IMMEDIATE`, so overlapping writers on the
//!   same database serialize instead of losing updates.
//! - Query ties are broken by `rowid`, which an upsert never changes.

use super::{Entity, EntityStore, Query, StoreError, StoreResult, StoreTransaction};
use crate::db::{open_db, open_db_in_memory};
use crate::model::key::{EntityKey, EntityKind};
use log::error;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const ENTITY_SELECT_SQL: &str = "SELECT properties FROM entities WHERE kind = ?1 AND id = ?2;";

/// `EntityStore` implementation over one migrated SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wraps an already migrated connection (see `db::open_db`).
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

impl EntityStore for SqliteStore {
    fn get(&self, key: &EntityKey) -> StoreResult<Option<Entity>> {
        let conn = self.lock()?;
        load_entity(&conn, key)
    }

    fn get_many(&self, keys: &[EntityKey]) -> StoreResult<Vec<Option<Entity>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(ENTITY_SELECT_SQL)?;
        let mut entities = Vec::with_capacity(keys.len());
        for key in keys {
            let properties = stmt
                .query_row(params![key.kind().as_str(), key.id()], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;
            entities.push(match properties {
                Some(text) => Some(parse_entity(key.clone(), &text)?),
                None => None,
            });
        }
        Ok(entities)
    }

    fn query(&self, query: &Query) -> StoreResult<Vec<Entity>> {
        let mut sql = String::from("SELECT id, properties FROM entities WHERE kind = ?");
        let mut bind_values = vec![SqlValue::Text(query.kind.as_str().to_string())];

        for filter in &query.filters {
            sql.push_str(&format!(
                " AND json_extract(properties, '$.{}') = ?",
                filter.property()
            ));
            bind_values.push(json_to_sql(filter.value())?);
        }

        match query.order {
            Some(order) => sql.push_str(&format!(
                " ORDER BY json_extract(properties, '$.{}') {}, rowid ASC",
                order.property(),
                if order.is_descending() { "DESC" } else { "ASC" }
            )),
            None => sql.push_str(" ORDER BY rowid ASC"),
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get("id")?;
            let properties: String = row.get("properties")?;
            entities.push(parse_entity(EntityKey::new(query.kind, id), &properties)?);
        }
        Ok(entities)
    }

    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let mut handle = SqliteTransaction { tx };

        // Dropping `handle` on the error path rolls the transaction back.
        let output = work(&mut handle)?;

        if let Err(err) = handle.tx.commit() {
            error!(
                "event=store_commit module=store status=error store=sqlite error_code=commit_failed error={}",
                err
            );
            return Err(StoreError::CommitFailed(err.to_string()).into());
        }
        Ok(output)
    }
}

struct SqliteTransaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn get(&mut self, key: &EntityKey) -> StoreResult<Option<Entity>> {
        load_entity(&self.tx, key)
    }

    fn put(&mut self, entity: Entity) -> StoreResult<()> {
        let properties = serde_json::to_string(&entity.properties)?;
        self.tx.execute(
            "INSERT INTO entities (kind, id, properties)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (kind, id) DO UPDATE SET properties = excluded.properties;",
            params![entity.key.kind().as_str(), entity.key.id(), properties],
        )?;
        Ok(())
    }

    fn allocate_id(&mut self, kind: EntityKind) -> StoreResult<i64> {
        self.tx.execute(
            "INSERT INTO id_sequences (kind, last_id)
             VALUES (?1, 1)
             ON CONFLICT (kind) DO UPDATE SET last_id = last_id + 1;",
            [kind.as_str()],
        )?;
        let id = self.tx.query_row(
            "SELECT last_id FROM id_sequences WHERE kind = ?1;",
            [kind.as_str()],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(id)
    }
}

fn load_entity(conn: &Connection, key: &EntityKey) -> StoreResult<Option<Entity>> {
    let properties = conn
        .query_row(
            ENTITY_SELECT_SQL,
            params![key.kind().as_str(), key.id()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    match properties {
        Some(text) => Ok(Some(parse_entity(key.clone(), &text)?)),
        None => Ok(None),
    }
}

fn parse_entity(key: EntityKey, text: &str) -> StoreResult<Entity> {
    let properties = serde_json::from_str::<Map<String, Value>>(text).map_err(|err| {
        StoreError::InvalidData(format!("entity `{key}` has unreadable properties: {err}"))
    })?;
    Ok(Entity::new(key, properties))
}

fn json_to_sql(value: &Value) -> StoreResult<SqlValue> {
    match value {
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(integer), _) => Ok(SqlValue::Integer(integer)),
            (None, Some(real)) => Ok(SqlValue::Real(real)),
            (None, None) => Err(StoreError::InvalidData(format!(
                "unsupported numeric filter value `{number}`"
            ))),
        },
        other => Err(StoreError::InvalidData(format!(
            "unsupported filter value `{other}`"
        ))),
    }
}
