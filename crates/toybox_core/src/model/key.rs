//! Entity identity and its external string encoding.
//!
//! # Responsibility
//! - Name every persisted entity with a `(kind, id)` pair.
//! - Encode keys as `<Kind>::<id>` and vote ids as `<post_id>/<member_uid>`.
//!
//! # Invariants
//! - `decode(encode(k)) == k` for every key the core produces; repositories
//!   refuse blank member uids, so no key ever ends in a bare separator.
//! - Decoding checks the id against its kind: post ids are integers and
//!   vote ids are `<post_id>/<member_uid>`.
//! - Only the first `::` separates kind from id; only the first `/`
//!   separates post id from member uid. Ids may contain either sequence.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Store-allocated post identifier.
pub type PostId = i64;

const KIND_SEPARATOR: &str = "::";
const VOTE_SEPARATOR: char = '/';

/// Persisted entity kinds known to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Member,
    Post,
    Vote,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "Member",
            Self::Post => "Post",
            Self::Vote => "Vote",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "Member" => Some(Self::Member),
            "Post" => Some(Self::Post),
            "Vote" => Some(Self::Vote),
            _ => None,
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an encoded key or vote id cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    MissingSeparator(String),
    UnknownKind(String),
    EmptyId(String),
    InvalidPostId(String),
}

impl Display for KeyParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSeparator(value) => write!(f, "key `{value}` has no separator"),
            Self::UnknownKind(value) => write!(f, "unknown entity kind `{value}`"),
            Self::EmptyId(value) => write!(f, "key `{value}` has an empty id"),
            Self::InvalidPostId(value) => write!(f, "invalid post id `{value}`"),
        }
    }
}

impl Error for KeyParseError {}

/// Flat entity key, the only handle callers keep across requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    kind: EntityKind,
    id: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn member(member_uid: &str) -> Self {
        Self::new(EntityKind::Member, member_uid)
    }

    pub fn post(post_id: PostId) -> Self {
        Self::new(EntityKind::Post, post_id.to_string())
    }

    pub fn vote(vote_id: &VoteId) -> Self {
        Self::new(EntityKind::Vote, vote_id.to_string())
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{KIND_SEPARATOR}{}", self.kind, self.id)
    }
}

impl FromStr for EntityKey {
    type Err = KeyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (kind, id) = value
            .split_once(KIND_SEPARATOR)
            .ok_or_else(|| KeyParseError::MissingSeparator(value.to_string()))?;
        let kind =
            EntityKind::parse(kind).ok_or_else(|| KeyParseError::UnknownKind(kind.to_string()))?;
        match kind {
            _ if id.is_empty() => return Err(KeyParseError::EmptyId(value.to_string())),
            EntityKind::Member => {}
            EntityKind::Post => {
                id.parse::<PostId>()
                    .map_err(|_| KeyParseError::InvalidPostId(id.to_string()))?;
            }
            EntityKind::Vote => {
                id.parse::<VoteId>()?;
            }
        }
        Ok(Self::new(kind, id))
    }
}

/// Composite identity of the single vote a member holds on a post.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoteId {
    pub post_id: PostId,
    pub member_uid: String,
}

impl VoteId {
    pub fn new(post_id: PostId, member_uid: impl Into<String>) -> Self {
        Self {
            post_id,
            member_uid: member_uid.into(),
        }
    }
}

impl Display for VoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{VOTE_SEPARATOR}{}", self.post_id, self.member_uid)
    }
}

impl FromStr for VoteId {
    type Err = KeyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (post_id, member_uid) = value
            .split_once(VOTE_SEPARATOR)
            .ok_or_else(|| KeyParseError::MissingSeparator(value.to_string()))?;
        let post_id = post_id
            .parse::<PostId>()
            .map_err(|_| KeyParseError::InvalidPostId(post_id.to_string()))?;
        if member_uid.is_empty() {
            return Err(KeyParseError::EmptyId(value.to_string()));
        }
        Ok(Self::new(post_id, member_uid))
    }
}
