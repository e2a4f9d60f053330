//! Vote domain model and toggle-vote state machine.
//!
//! # Responsibility
//! - Represent the single vote row a member holds on a post.
//! - Own the transition rule between `Up`, `Down` and `Neutral`.
//! - Own the up/down counter arithmetic applied to post aggregates.
//!
//! # Invariants
//! - Casting the same direction twice returns the vote to `Neutral`.
//! - Casting the opposite direction moves directly between `Up` and `Down`.
//! - A cancelled vote keeps its row with `value = 0`; rows are never deleted.

use crate::model::key::{EntityKey, EntityKind, PostId, VoteId};
use crate::store::Record;
use serde::{Deserialize, Serialize};

/// Effective state of one member's vote on one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteValue {
    Down,
    Neutral,
    Up,
}

impl VoteValue {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Down => -1,
            Self::Neutral => 0,
            Self::Up => 1,
        }
    }

    /// Applies the toggle rule for a directional cast.
    ///
    /// `previous` is `None` when the member never voted on the post.
    pub fn resolve(previous: Option<Self>, cast: Self) -> Self {
        match previous {
            Some(previous) if previous == cast => Self::Neutral,
            _ => cast,
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Down),
            0 => Ok(Self::Neutral),
            1 => Ok(Self::Up),
            other => Err(other),
        }
    }
}

/// Up/down counters of a post, kept apart from the post for arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteTally {
    pub up: i64,
    pub down: i64,
}

impl VoteTally {
    /// Removes one vote's contribution; `None` if a counter would go negative.
    pub fn retract(self, value: VoteValue) -> Option<Self> {
        match value {
            VoteValue::Up => self.up.checked_sub(1).filter(|up| *up >= 0).map(|up| Self {
                up,
                ..self
            }),
            VoteValue::Down => self
                .down
                .checked_sub(1)
                .filter(|down| *down >= 0)
                .map(|down| Self { down, ..self }),
            VoteValue::Neutral => Some(self),
        }
    }

    /// Adds one vote's contribution.
    pub fn cast(self, value: VoteValue) -> Self {
        match value {
            VoteValue::Up => Self {
                up: self.up + 1,
                ..self
            },
            VoteValue::Down => Self {
                down: self.down + 1,
                ..self
            },
            VoteValue::Neutral => self,
        }
    }

    pub fn total(self) -> i64 {
        self.up - self.down
    }
}

/// One member's vote row on one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub post_id: PostId,
    pub member_uid: String,
    /// Raw persisted value; `-1`, `0` or `1` when written by the core.
    pub value: i64,
    pub created_on: i64,
    pub updated_on: i64,
    pub version: i64,
}

impl Vote {
    /// Unwritten placeholder for a pair that never voted: neutral, version 0.
    pub fn pending(post_id: PostId, member_uid: impl Into<String>, now: i64) -> Self {
        Self {
            post_id,
            member_uid: member_uid.into(),
            value: VoteValue::Neutral.as_i64(),
            created_on: now,
            updated_on: now,
            version: 0,
        }
    }

    pub fn id(&self) -> VoteId {
        VoteId::new(self.post_id, self.member_uid.clone())
    }

    /// Decodes the persisted value; `Err` carries the out-of-range raw value.
    pub fn state(&self) -> Result<VoteValue, i64> {
        VoteValue::try_from(self.value)
    }

    /// Returns the next version holding `value`.
    pub fn with_value(&self, value: VoteValue, now: i64) -> Self {
        Self {
            value: value.as_i64(),
            updated_on: now,
            version: self.version + 1,
            ..self.clone()
        }
    }
}

impl Record for Vote {
    const KIND: EntityKind = EntityKind::Vote;

    fn key(&self) -> EntityKey {
        EntityKey::vote(&self.id())
    }
}
