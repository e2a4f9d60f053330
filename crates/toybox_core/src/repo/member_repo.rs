//! Member repository.
//!
//! # Responsibility
//! - Get-or-create members on first access by an identity.
//! - Update the settings blob under optimistic concurrency.
//!
//! # Invariants
//! - A stale `expected_version` fails with `ETag` and writes nothing.
//! - Only `data`, `updated_on` and `version` change on update.

use crate::error::{RepoError, RepoResult};
use crate::model::key::{EntityKey, EntityKind};
use crate::model::member::Member;
use crate::model::now_epoch_ms;
use crate::repo::{normalize_payload, require_member_uid};
use crate::store::{EntityStore, Query, Record, StoreTransaction};
use log::{info, warn};

/// Member persistence over an injected store.
pub struct MemberRepository<'s, S: EntityStore> {
    store: &'s S,
}

impl<'s, S: EntityStore> MemberRepository<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Reads one member outside a transaction.
    pub fn get(&self, member_uid: &str) -> RepoResult<Option<Member>> {
        require_member_uid(member_uid)?;
        match self.store.get(&EntityKey::member(member_uid))? {
            Some(entity) => Ok(Some(Member::from_entity(entity)?)),
            None => Ok(None),
        }
    }

    /// Lists all members in creation order.
    pub fn query_all(&self) -> RepoResult<Vec<Member>> {
        self.store
            .query(&Query::new(EntityKind::Member))?
            .into_iter()
            .map(|entity| Ok(Member::from_entity(entity)?))
            .collect()
    }

    /// Loads the member for `member_uid`, creating it when allowed.
    ///
    /// Returns `Ok(None)` only when the member is absent and
    /// `create_if_missing` is `false`.
    pub fn get_or_create(
        &self,
        member_uid: &str,
        create_if_missing: bool,
    ) -> RepoResult<Option<Member>> {
        require_member_uid(member_uid)?;
        let (member, created) = self.store.transaction(|tx| -> RepoResult<_> {
            if let Some(member) = load_member(tx, member_uid)? {
                return Ok((Some(member), false));
            }
            if !create_if_missing {
                return Ok((None, false));
            }

            let member = Member::new(member_uid, now_epoch_ms());
            tx.put(member.to_entity()?)?;
            Ok((Some(member), true))
        })?;

        if created {
            info!("event=member_create module=repo status=ok version=1");
        }
        Ok(member)
    }

    /// Replaces the settings blob and bumps the version.
    ///
    /// # Errors
    /// - `NotFound` when the member does not exist.
    /// - `ETag` when `expected_version` differs from the stored version.
    /// - `InvalidField { name: "data" }` when `data` is not JSON.
    pub fn update(
        &self,
        member_uid: &str,
        data: &str,
        expected_version: Option<i64>,
    ) -> RepoResult<Member> {
        require_member_uid(member_uid)?;
        let result = self.store.transaction(|tx| -> RepoResult<Member> {
            let current = load_member(tx, member_uid)?
                .ok_or_else(|| RepoError::not_found(&EntityKey::member(member_uid)))?;

            if let Some(expected) = expected_version {
                if expected != current.version {
                    return Err(RepoError::ETag {
                        expected,
                        actual: current.version,
                    });
                }
            }

            let data = normalize_payload("data", data)?;
            let updated = current.with_data(data, now_epoch_ms());
            tx.put(updated.to_entity()?)?;
            Ok(updated)
        });

        match &result {
            Ok(member) => info!(
                "event=member_update module=repo status=ok version={}",
                member.version
            ),
            Err(RepoError::ETag { expected, actual }) => warn!(
                "event=member_update module=repo status=conflict expected_version={} actual_version={}",
                expected, actual
            ),
            Err(_) => {}
        }
        result
    }
}

/// Reads a member inside an open transaction.
pub(crate) fn load_member(
    tx: &mut dyn StoreTransaction,
    member_uid: &str,
) -> RepoResult<Option<Member>> {
    match tx.get(&EntityKey::member(member_uid))? {
        Some(entity) => Ok(Some(Member::from_entity(entity)?)),
        None => Ok(None),
    }
}
