//! Board use cases composed from the repositories.
//!
//! # Responsibility
//! - Provide one entry point per caller action: whoami, registration,
//!   profile edit, member list, post list, post insert/delete and vote.
//! - Keep settings-blob shaping (registration and profile sections) out of
//!   the repositories.
//!
//! # Invariants
//! - Settings writes always go through `MemberRepository::update`, so stale
//!   ETags are rejected without a write.
//! - Non-admin callers never see members without a public profile.
//!
//! # See also
//! - `crate::repo` for the transactional rules each action relies on.

use crate::error::{RepoError, RepoResult};
use crate::model::key::{EntityKey, PostId};
use crate::model::member::Member;
use crate::model::now_epoch_ms;
use crate::model::post::{Post, PostView};
use crate::repo::member_repo::MemberRepository;
use crate::repo::post_repo::PostRepository;
use crate::repo::vote_repo::{self, VoteRepository};
use crate::store::{EntityStore, StoreError};
use log::info;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Upper bound on members returned by `list_members`.
pub const MAX_MEMBERS_IN_LIST: usize = 500;

/// Profile visibility that exposes a member to non-admin callers.
pub const PROFILE_VISIBILITY_PUBLIC: &str = "public";

const REQUIRED_PROFILE_FIELDS: [(&str, &str); 3] = [
    ("title", "Title is required."),
    ("location", "Location is required."),
    ("about", "Information about you is required."),
];

/// Identity details recorded when a member registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub email: String,
}

/// Settings view of the calling member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberProfile {
    pub slug: Uuid,
    pub settings: Value,
    /// Current member version; send it back to guard the next settings write.
    pub etag: i64,
}

impl MemberProfile {
    fn from_member(member: &Member) -> RepoResult<Self> {
        Ok(Self {
            slug: member.slug,
            settings: settings_of(member)?,
            etag: member.version,
        })
    }
}

/// One row of the member directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberSummary {
    pub slug: Uuid,
    pub profile: Option<Value>,
    pub registration: Option<Value>,
}

/// Board facade over one injected store.
pub struct BoardService<'s, S: EntityStore> {
    members: MemberRepository<'s, S>,
    posts: PostRepository<'s, S>,
    votes: VoteRepository<'s, S>,
}

impl<'s, S: EntityStore> BoardService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            members: MemberRepository::new(store),
            posts: PostRepository::new(store),
            votes: VoteRepository::new(store),
        }
    }

    /// Returns the caller's settings, creating the member on first access.
    pub fn whoami(&self, member_uid: &str) -> RepoResult<MemberProfile> {
        let member = self.load_or_create(member_uid)?;
        MemberProfile::from_member(&member)
    }

    /// Marks the caller registered and records `registration` in settings.
    ///
    /// `etag` defaults to the member's current version when absent.
    pub fn register(
        &self,
        member_uid: &str,
        registration: &Registration,
        etag: Option<i64>,
    ) -> RepoResult<MemberProfile> {
        let mut record = serde_json::to_value(registration).map_err(StoreError::from)?;
        if let Value::Object(fields) = &mut record {
            fields.insert("created_on".to_string(), Value::from(now_epoch_ms()));
        }

        let member = self.edit_settings(member_uid, etag, |settings| {
            settings.insert("registered".to_string(), Value::Bool(true));
            settings.insert("registration".to_string(), record);
        })?;
        info!(
            "event=member_register module=service status=ok version={}",
            member.version
        );
        MemberProfile::from_member(&member)
    }

    /// Validates `profile` and stores it under `settings.profile`.
    ///
    /// # Errors
    /// - `InvalidField { name: "profile" }` when `profile` is not a JSON object.
    /// - `InvalidField` naming the first missing required attribute.
    pub fn update_profile(
        &self,
        member_uid: &str,
        profile: &str,
        etag: Option<i64>,
    ) -> RepoResult<MemberProfile> {
        let profile = parse_profile(profile)?;
        let member = self.edit_settings(member_uid, etag, |settings| {
            settings.insert("profile".to_string(), Value::Object(profile));
        })?;
        info!(
            "event=member_profile module=service status=ok version={}",
            member.version
        );
        MemberProfile::from_member(&member)
    }

    /// Lists members visible to the caller, oldest first.
    pub fn list_members(&self, is_admin: bool) -> RepoResult<Vec<MemberSummary>> {
        let mut results = Vec::new();
        for member in self.members.query_all()? {
            if results.len() >= MAX_MEMBERS_IN_LIST {
                break;
            }

            let mut settings = settings_of(&member)?;
            let profile = settings.get_mut("profile").map(Value::take);
            let registration = settings.get_mut("registration").map(Value::take);

            let is_public = profile
                .as_ref()
                .and_then(|profile| profile.get("visibility"))
                .and_then(Value::as_str)
                == Some(PROFILE_VISIBILITY_PUBLIC);
            if !(is_public || is_admin) {
                continue;
            }

            results.push(MemberSummary {
                slug: member.slug,
                profile,
                registration,
            });
        }
        Ok(results)
    }

    /// All live posts as seen by the caller.
    pub fn list_posts(&self, member_uid: &str) -> RepoResult<Vec<PostView>> {
        let posts = self.posts.query_all()?;
        self.votes.query_posts_with_votes(member_uid, posts)
    }

    /// The caller's own live posts.
    pub fn list_member_posts(&self, member_uid: &str) -> RepoResult<Vec<PostView>> {
        let posts = self.posts.query_by_member(member_uid)?;
        self.votes.query_posts_with_votes(member_uid, posts)
    }

    pub fn insert_post(&self, member_uid: &str, post_data: &str) -> RepoResult<Post> {
        self.posts.insert(member_uid, post_data)
    }

    pub fn delete_post(&self, member_uid: &str, post_id: PostId) -> RepoResult<()> {
        self.posts.mark_deleted(member_uid, post_id)
    }

    /// Casts a vote and returns the post projection carrying the written vote.
    pub fn cast_vote(&self, member_uid: &str, post_id: PostId, value: i64) -> RepoResult<PostView> {
        let (post, vote) = self.votes.insert_vote(member_uid, post_id, value)?;
        vote_repo::project(member_uid, &post, Some(vote.value))
    }

    fn load_or_create(&self, member_uid: &str) -> RepoResult<Member> {
        self.members
            .get_or_create(member_uid, true)?
            .ok_or_else(|| RepoError::not_found(&EntityKey::member(member_uid)))
    }

    fn edit_settings<F>(&self, member_uid: &str, etag: Option<i64>, edit: F) -> RepoResult<Member>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let member = self.load_or_create(member_uid)?;
        let version = etag.unwrap_or(member.version);

        let mut settings = match settings_of(&member)? {
            Value::Object(settings) => settings,
            _ => Map::new(),
        };
        edit(&mut settings);

        let data = Value::Object(settings).to_string();
        self.members.update(member_uid, &data, Some(version))
    }
}

fn settings_of(member: &Member) -> RepoResult<Value> {
    member.settings().map_err(|err| {
        RepoError::Store(StoreError::InvalidData(format!(
            "member settings are unreadable: {err}"
        )))
    })
}

fn parse_profile(raw: &str) -> RepoResult<Map<String, Value>> {
    let profile = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(profile)) => profile,
        Ok(_) => {
            return Err(RepoError::invalid_field(
                "profile",
                "Provided \"profile\" must be a JSON object.",
            ))
        }
        Err(_) => {
            return Err(RepoError::invalid_field(
                "profile",
                "Provided \"profile\" is not a valid JSON.",
            ))
        }
    };

    for (name, message) in REQUIRED_PROFILE_FIELDS {
        if is_blank(profile.get(name)) {
            return Err(RepoError::invalid_field(name, message));
        }
    }
    Ok(profile)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(fields)) => fields.is_empty(),
        Some(Value::Bool(true)) | Some(Value::Number(_)) => false,
    }
}
