//! Post repository.
//!
//! # Responsibility
//! - Insert member-authored posts and soft-delete them on the author's behalf.
//! - Serve the fixed list queries ordered by vote total.
//!
//! # Invariants
//! - Only an existing member can author a post.
//! - Only the author can mark a post deleted; deletion is never reversed.
//! - List queries never return deleted posts.

use crate::error::{BusinessRuleViolation, RepoError, RepoResult};
use crate::model::key::{EntityKey, EntityKind, PostId};
use crate::model::now_epoch_ms;
use crate::model::post::Post;
use crate::repo::member_repo::load_member;
use crate::repo::{normalize_payload, require_member_uid};
use crate::store::{EntityStore, Filter, Order, Query, Record, StoreTransaction};
use log::{info, warn};

/// Post persistence over an injected store.
pub struct PostRepository<'s, S: EntityStore> {
    store: &'s S,
}

impl<'s, S: EntityStore> PostRepository<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Reads one post (deleted or not) outside a transaction.
    pub fn get(&self, post_id: PostId) -> RepoResult<Post> {
        let key = EntityKey::post(post_id);
        match self.store.get(&key)? {
            Some(entity) => Ok(Post::from_entity(entity)?),
            None => Err(RepoError::not_found(&key)),
        }
    }

    /// Non-deleted posts, highest `votes_total` first.
    pub fn query_all(&self) -> RepoResult<Vec<Post>> {
        self.run_query(
            Query::new(EntityKind::Post)
                .filter(Filter::not_deleted())
                .order(Order::votes_total_desc()),
        )
    }

    /// Non-deleted posts of one author, highest `votes_total` first.
    pub fn query_by_member(&self, member_uid: &str) -> RepoResult<Vec<Post>> {
        require_member_uid(member_uid)?;
        self.run_query(
            Query::new(EntityKind::Post)
                .filter(Filter::not_deleted())
                .filter(Filter::member_uid(member_uid))
                .order(Order::votes_total_desc()),
        )
    }

    /// Creates a post for an existing member.
    ///
    /// # Errors
    /// - `NotFound` when `member_uid` has no member.
    /// - `InvalidField { name: "data" }` when `post_data` is not JSON.
    pub fn insert(&self, member_uid: &str, post_data: &str) -> RepoResult<Post> {
        require_member_uid(member_uid)?;
        let post = self.store.transaction(|tx| -> RepoResult<Post> {
            if load_member(tx, member_uid)?.is_none() {
                return Err(RepoError::not_found(&EntityKey::member(member_uid)));
            }

            let data = normalize_payload("data", post_data)?;
            let post_id = tx.allocate_id(EntityKind::Post)?;
            let post = Post::new(post_id, member_uid, data, now_epoch_ms());
            tx.put(post.to_entity()?)?;
            Ok(post)
        })?;

        info!(
            "event=post_insert module=repo status=ok post_id={}",
            post.id
        );
        Ok(post)
    }

    /// Soft-deletes a post on behalf of its author.
    ///
    /// Deleting an already deleted post succeeds without a write.
    ///
    /// # Errors
    /// - `NotFound` when the post does not exist.
    /// - `BusinessRule(AccessDenied)` when `member_uid` is not the author.
    pub fn mark_deleted(&self, member_uid: &str, post_id: PostId) -> RepoResult<()> {
        require_member_uid(member_uid)?;
        let result = self.store.transaction(|tx| -> RepoResult<()> {
            let post = load_post(tx, post_id)?
                .ok_or_else(|| RepoError::not_found(&EntityKey::post(post_id)))?;

            if !post.is_authored_by(member_uid) {
                return Err(BusinessRuleViolation::AccessDenied {
                    action: "deleting post",
                }
                .into());
            }
            if post.is_deleted {
                return Ok(());
            }

            tx.put(post.deleted(now_epoch_ms()).to_entity()?)?;
            Ok(())
        });

        match &result {
            Ok(()) => info!("event=post_delete module=repo status=ok post_id={post_id}"),
            Err(RepoError::BusinessRule(_)) => {
                warn!("event=post_delete module=repo status=denied post_id={post_id}")
            }
            Err(_) => {}
        }
        result
    }

    fn run_query(&self, query: Query) -> RepoResult<Vec<Post>> {
        self.store
            .query(&query)?
            .into_iter()
            .map(|entity| Ok(Post::from_entity(entity)?))
            .collect()
    }
}

/// Reads a post inside an open transaction.
pub(crate) fn load_post(
    tx: &mut dyn StoreTransaction,
    post_id: PostId,
) -> RepoResult<Option<Post>> {
    match tx.get(&EntityKey::post(post_id))? {
        Some(entity) => Ok(Some(Post::from_entity(entity)?)),
        None => Ok(None),
    }
}
