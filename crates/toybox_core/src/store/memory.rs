//! In-process entity store.
//!
//! # Responsibility
//! - Implement the store port entirely in memory for tests and embedding.
//! - Offer failure injection so callers can exercise infrastructure paths.
//!
//! # Invariants
//! - Transactions are serialized by one mutex; writes are buffered and only
//!   applied after `work` succeeds and the commit is not failed.
//! - Every row keeps the sequence number of its first insert; query ties are
//!   broken by that sequence.

use super::{Entity, EntityStore, Query, StoreError, StoreResult, StoreTransaction};
use crate::model::key::{EntityKey, EntityKind};
use log::warn;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct StoredRow {
    seq: u64,
    entity: Entity,
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: BTreeMap<EntityKey, StoredRow>,
    next_seq: u64,
    id_sequences: BTreeMap<EntityKind, i64>,
}

impl MemoryState {
    fn write(&mut self, entity: Entity) {
        match self.rows.get_mut(&entity.key) {
            Some(row) => row.entity = entity,
            None => {
                self.next_seq += 1;
                let seq = self.next_seq;
                self.rows.insert(entity.key.clone(), StoredRow { seq, entity });
            }
        }
    }
}

/// Mutex-guarded in-memory implementation of `EntityStore`.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    available: AtomicBool,
    fail_next_commit: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            available: AtomicBool::new(true),
            fail_next_commit: AtomicBool::new(false),
        }
    }

    /// Toggles simulated availability; while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes the next transaction commit fail after `work` has succeeded.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of stored rows of `kind`.
    pub fn count(&self, kind: EntityKind) -> StoreResult<usize> {
        let state = self.lock()?;
        Ok(state
            .rows
            .keys()
            .filter(|key| key.kind() == kind)
            .count())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store is marked unavailable".to_string(),
            ));
        }
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl EntityStore for MemoryStore {
    fn get(&self, key: &EntityKey) -> StoreResult<Option<Entity>> {
        let state = self.lock()?;
        Ok(state.rows.get(key).map(|row| row.entity.clone()))
    }

    fn get_many(&self, keys: &[EntityKey]) -> StoreResult<Vec<Option<Entity>>> {
        let state = self.lock()?;
        Ok(keys
            .iter()
            .map(|key| state.rows.get(key).map(|row| row.entity.clone()))
            .collect())
    }

    fn query(&self, query: &Query) -> StoreResult<Vec<Entity>> {
        let state = self.lock()?;
        let mut rows = state
            .rows
            .values()
            .filter(|row| query.matches(&row.entity))
            .collect::<Vec<_>>();
        rows.sort_by_key(|row| row.seq);
        if let Some(order) = query.order {
            rows.sort_by(|left, right| order.compare(&left.entity, &right.entity));
        }
        Ok(rows.into_iter().map(|row| row.entity.clone()).collect())
    }

    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut state = self.lock()?;
        let mut tx = MemoryTransaction {
            state: &mut *state,
            pending: Vec::new(),
        };
        let output = work(&mut tx)?;
        let pending = tx.pending;

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            warn!(
                "event=store_commit module=store status=error store=memory error_code=injected_commit_failure discarded_writes={}",
                pending.len()
            );
            return Err(StoreError::CommitFailed("injected commit failure".to_string()).into());
        }

        for entity in pending {
            state.write(entity);
        }
        Ok(output)
    }
}

struct MemoryTransaction<'s> {
    state: &'s mut MemoryState,
    pending: Vec<Entity>,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn get(&mut self, key: &EntityKey) -> StoreResult<Option<Entity>> {
        if let Some(entity) = self.pending.iter().find(|entity| &entity.key == key) {
            return Ok(Some(entity.clone()));
        }
        Ok(self.state.rows.get(key).map(|row| row.entity.clone()))
    }

    fn put(&mut self, entity: Entity) -> StoreResult<()> {
        match self
            .pending
            .iter_mut()
            .find(|pending| pending.key == entity.key)
        {
            Some(slot) => *slot = entity,
            None => self.pending.push(entity),
        }
        Ok(())
    }

    fn allocate_id(&mut self, kind: EntityKind) -> StoreResult<i64> {
        let next = self.state.id_sequences.entry(kind).or_insert(0);
        *next += 1;
        Ok(*next)
    }
}
