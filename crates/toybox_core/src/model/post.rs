//! Post domain model and list projection.
//!
//! # Invariants
//! - `votes_total == votes_up - votes_down` for every value built here.
//! - `member_uid` never changes after creation.
//! - `is_deleted` only moves from `false` to `true`.

use crate::model::key::{EntityKey, EntityKind, PostId};
use crate::model::vote::VoteTally;
use crate::store::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Member-authored post with vote aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    /// Author identity.
    pub member_uid: String,
    /// Post body as JSON text.
    pub data: String,
    pub votes_up: i64,
    pub votes_down: i64,
    pub votes_total: i64,
    /// Soft delete tombstone; deleted posts keep their row.
    pub is_deleted: bool,
    pub created_on: i64,
    pub updated_on: Option<i64>,
    pub version: i64,
}

impl Post {
    /// Creates a first-version post with zeroed counters.
    pub fn new(id: PostId, member_uid: impl Into<String>, data: String, now: i64) -> Self {
        Self {
            id,
            member_uid: member_uid.into(),
            data,
            votes_up: 0,
            votes_down: 0,
            votes_total: 0,
            is_deleted: false,
            created_on: now,
            updated_on: None,
            version: 1,
        }
    }

    pub fn is_authored_by(&self, member_uid: &str) -> bool {
        self.member_uid == member_uid
    }

    pub fn tally(&self) -> VoteTally {
        VoteTally {
            up: self.votes_up,
            down: self.votes_down,
        }
    }

    /// Returns the next version carrying `tally`, with the total recomputed.
    pub fn with_tally(&self, tally: VoteTally, now: i64) -> Self {
        Self {
            votes_up: tally.up,
            votes_down: tally.down,
            votes_total: tally.total(),
            updated_on: Some(now),
            version: self.version + 1,
            ..self.clone()
        }
    }

    /// Returns the next version with the tombstone set.
    pub fn deleted(&self, now: i64) -> Self {
        Self {
            is_deleted: true,
            updated_on: Some(now),
            version: self.version + 1,
            ..self.clone()
        }
    }
}

impl Record for Post {
    const KIND: EntityKind = EntityKind::Post;

    fn key(&self) -> EntityKey {
        EntityKey::post(self.id)
    }
}

/// Caller-facing projection of a post as seen by one member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    pub uid: PostId,
    /// Whether the viewing member authored the post.
    pub can_delete: bool,
    pub data: Value,
    /// The viewer's own vote value; `None` if they never voted.
    pub my_vote_value: Option<i64>,
    pub votes_up: i64,
    pub votes_down: i64,
    pub votes_total: i64,
}

impl PostView {
    /// Projects `post` for `viewer_uid`; fails only if the stored body is not JSON.
    pub fn project(
        viewer_uid: &str,
        post: &Post,
        my_vote_value: Option<i64>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            uid: post.id,
            can_delete: post.is_authored_by(viewer_uid),
            data: serde_json::from_str(&post.data)?,
            my_vote_value,
            votes_up: post.votes_up,
            votes_down: post.votes_down,
            votes_total: post.votes_total,
        })
    }
}
