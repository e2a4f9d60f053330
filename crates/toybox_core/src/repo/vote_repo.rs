//! Vote repository: toggle votes and post aggregate maintenance.
//!
//! # Responsibility
//! - Record one vote per (post, member) pair and keep the post's
//!   `votes_up`/`votes_down`/`votes_total` consistent with it.
//! - Project posts together with the viewer's own vote values.
//!
//! # Invariants
//! - The vote row and the post aggregate are written in one transaction.
//! - After every committed vote, `votes_total == votes_up - votes_down`.
//! - Vote rows are never deleted; a cancelled vote is stored with value 0.
//! - Projection never fetches more vote rows than posts it was given.

use crate::error::{BusinessRuleViolation, RepoError, RepoResult};
use crate::model::key::{EntityKey, EntityKind, PostId, VoteId};
use crate::model::now_epoch_ms;
use crate::model::post::{Post, PostView};
use crate::model::vote::{Vote, VoteValue};
use crate::repo::post_repo::load_post;
use crate::repo::require_member_uid;
use crate::store::{EntityStore, Filter, Order, Query, Record, StoreError};
use log::info;
use std::collections::HashMap;

/// Upper bound on posts projected by one `query_posts_with_votes` call.
pub const MAX_POSTS_IN_LIST: usize = 500;

/// Vote persistence over an injected store.
pub struct VoteRepository<'s, S: EntityStore> {
    store: &'s S,
}

impl<'s, S: EntityStore> VoteRepository<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Casts `value` (`+1` or `-1`) for `member_uid` on `post_id`.
    ///
    /// Repeating the member's current direction cancels the vote; the
    /// opposite direction switches it. Returns the written post and vote.
    ///
    /// # Errors
    /// - `BusinessRule(IllegalVoteValue)` for any other value, before the
    ///   transaction opens.
    /// - `NotFound` when the post does not exist.
    /// - `BusinessRule(CorruptVoteValue | CorruptAggregate)` when stored
    ///   state breaks the vote invariants; nothing is written.
    pub fn insert_vote(
        &self,
        member_uid: &str,
        post_id: PostId,
        value: i64,
    ) -> RepoResult<(Post, Vote)> {
        require_member_uid(member_uid)?;
        let cast = match VoteValue::try_from(value) {
            Ok(cast @ (VoteValue::Up | VoteValue::Down)) => cast,
            _ => return Err(BusinessRuleViolation::IllegalVoteValue(value).into()),
        };
        let vote_key = EntityKey::vote(&VoteId::new(post_id, member_uid));

        let (post, vote) = self.store.transaction(|tx| -> RepoResult<(Post, Vote)> {
            let now = now_epoch_ms();
            let post = load_post(tx, post_id)?
                .ok_or_else(|| RepoError::not_found(&EntityKey::post(post_id)))?;

            let (vote, previous, tally) = match tx.get(&vote_key)? {
                None => (Vote::pending(post_id, member_uid, now), None, post.tally()),
                Some(entity) => {
                    let vote = Vote::from_entity(entity)?;
                    let previous =
                        vote.state()
                            .map_err(|value| BusinessRuleViolation::CorruptVoteValue {
                                vote: vote_key.clone(),
                                value,
                            })?;
                    let tally = post
                        .tally()
                        .retract(previous)
                        .ok_or(BusinessRuleViolation::CorruptAggregate { post_id })?;
                    (vote, Some(previous), tally)
                }
            };

            let next = VoteValue::resolve(previous, cast);
            let vote = vote.with_value(next, now);
            let post = post.with_tally(tally.cast(next), now);

            tx.put(vote.to_entity()?)?;
            tx.put(post.to_entity()?)?;
            Ok((post, vote))
        })?;

        info!(
            "event=vote_insert module=repo status=ok post_id={} value={} vote_version={} post_version={}",
            post.id, vote.value, vote.version, post.version
        );
        Ok((post, vote))
    }

    /// All votes, newest first.
    pub fn query_all(&self) -> RepoResult<Vec<Vote>> {
        self.run_query(Query::new(EntityKind::Vote).order(Order::created_on_desc()))
    }

    /// Votes cast on one post, newest first; cancelled votes included.
    pub fn query_post_votes(&self, post_id: PostId) -> RepoResult<Vec<Vote>> {
        self.run_query(
            Query::new(EntityKind::Vote)
                .filter(Filter::post_id(post_id))
                .order(Order::created_on_desc()),
        )
    }

    /// Votes cast by one member, newest first; cancelled votes included.
    pub fn query_member_votes(&self, member_uid: &str) -> RepoResult<Vec<Vote>> {
        require_member_uid(member_uid)?;
        self.run_query(
            Query::new(EntityKind::Vote)
                .filter(Filter::member_uid(member_uid))
                .order(Order::created_on_desc()),
        )
    }

    /// Batch-reads the member's votes for exactly `post_ids`.
    ///
    /// Missing votes are skipped; an empty input performs no store call.
    pub fn query_member_votes_for(
        &self,
        member_uid: &str,
        post_ids: &[PostId],
    ) -> RepoResult<Vec<Vote>> {
        require_member_uid(member_uid)?;
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys = post_ids
            .iter()
            .map(|post_id| EntityKey::vote(&VoteId::new(*post_id, member_uid)))
            .collect::<Vec<_>>();
        self.store
            .get_many(&keys)?
            .into_iter()
            .flatten()
            .map(|entity| Ok(Vote::from_entity(entity)?))
            .collect()
    }

    /// Projects up to `MAX_POSTS_IN_LIST` posts for `member_uid`, filling
    /// `my_vote_value` from one batch read of the member's votes.
    pub fn query_posts_with_votes<I>(&self, member_uid: &str, posts: I) -> RepoResult<Vec<PostView>>
    where
        I: IntoIterator<Item = Post>,
    {
        require_member_uid(member_uid)?;
        let posts = posts
            .into_iter()
            .take(MAX_POSTS_IN_LIST)
            .collect::<Vec<_>>();
        let post_ids = posts.iter().map(|post| post.id).collect::<Vec<_>>();

        let my_votes = self
            .query_member_votes_for(member_uid, &post_ids)?
            .into_iter()
            .map(|vote| (vote.post_id, vote.value))
            .collect::<HashMap<_, _>>();

        posts
            .iter()
            .map(|post| project(member_uid, post, my_votes.get(&post.id).copied()))
            .collect()
    }

    fn run_query(&self, query: Query) -> RepoResult<Vec<Vote>> {
        self.store
            .query(&query)?
            .into_iter()
            .map(|entity| Ok(Vote::from_entity(entity)?))
            .collect()
    }
}

/// Projects one post, treating an unreadable stored body as corrupt data.
pub fn project(member_uid: &str, post: &Post, my_vote_value: Option<i64>) -> RepoResult<PostView> {
    PostView::project(member_uid, post, my_vote_value).map_err(|err| {
        RepoError::Store(StoreError::InvalidData(format!(
            "post {} has unreadable data: {err}",
            post.id
        )))
    })
}
