//! Error taxonomy shared by every repository.
//!
//! # Responsibility
//! - Separate domain outcomes callers can act on from infrastructure faults.
//! - Build the caller-facing error envelope.
//!
//! # Invariants
//! - Domain errors carry enough structured data to be shown verbatim.
//! - Infrastructure details are logged, never put in an `ErrorPayload`.

use crate::model::key::{EntityKey, EntityKind, PostId};
use crate::store::StoreError;
use log::error;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const ERROR_ORIGIN: &str = "toybox.core";
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error. Please try again later.";

pub type RepoResult<T> = Result<T, RepoError>;

/// Coarse error category, stable for callers to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidField,
    BusinessRule,
    Infrastructure,
}

/// Operation refused given the current domain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusinessRuleViolation {
    /// Caller is not allowed to perform `action` on someone else's entity.
    AccessDenied { action: &'static str },
    /// Vote values other than `+1` and `-1` are rejected up front.
    IllegalVoteValue(i64),
    /// A stored vote holds a value outside `{-1, 0, 1}`.
    CorruptVoteValue { vote: EntityKey, value: i64 },
    /// Reverting a stored vote would drive a post counter below zero.
    CorruptAggregate { post_id: PostId },
}

impl Display for BusinessRuleViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccessDenied { action } => write!(f, "access denied {action}"),
            Self::IllegalVoteValue(value) => {
                write!(f, "allowed vote values are +1 and -1, was `{value}`")
            }
            Self::CorruptVoteValue { vote, value } => {
                write!(f, "bad stored vote value `{value}` in {vote}")
            }
            Self::CorruptAggregate { post_id } => {
                write!(f, "vote counters of post {post_id} are inconsistent")
            }
        }
    }
}

/// Repository error returned by every core operation.
#[derive(Debug)]
pub enum RepoError {
    /// Referenced entity does not exist.
    NotFound { kind: EntityKind, id: String },
    /// Caller presented a stale version (ETag).
    ETag { expected: i64, actual: i64 },
    /// Structured input failed validation; `name` is the offending field.
    InvalidField { name: String, message: String },
    BusinessRule(BusinessRuleViolation),
    /// Store failure; opaque to callers.
    Store(StoreError),
}

impl RepoError {
    pub fn not_found(key: &EntityKey) -> Self {
        Self::NotFound {
            kind: key.kind(),
            id: key.id().to_string(),
        }
    }

    pub fn invalid_field(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ETag { .. } => ErrorKind::Conflict,
            Self::InvalidField { .. } => ErrorKind::InvalidField,
            Self::BusinessRule(_) => ErrorKind::BusinessRule,
            Self::Store(_) => ErrorKind::Infrastructure,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFoundError",
            Self::ETag { .. } => "ETagError",
            Self::InvalidField { .. } => "InvalidFieldValueError",
            Self::BusinessRule(BusinessRuleViolation::AccessDenied { .. }) => "AccessDeniedError",
            Self::BusinessRule(_) => "BusinessRuleError",
            Self::Store(_) => "InternalError",
        }
    }

    pub fn is_domain(&self) -> bool {
        self.kind() != ErrorKind::Infrastructure
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "no {kind} for uid `{id}`"),
            Self::ETag { expected, actual } => write!(
                f,
                "object was modified by someone from version V{expected} to V{actual}"
            ),
            Self::InvalidField { name, message } => write!(f, "invalid field `{name}`: {message}"),
            Self::BusinessRule(violation) => write!(f, "{violation}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<BusinessRuleViolation> for RepoError {
    fn from(value: BusinessRuleViolation) -> Self {
        Self::BusinessRule(value)
    }
}

/// Error envelope handed to callers outside the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub origin: &'static str,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ErrorPayload {
    /// Converts `err` for a caller, collapsing infrastructure faults.
    ///
    /// # Side effects
    /// - Logs infrastructure faults with full detail at `error` level.
    pub fn from_error(err: &RepoError) -> Self {
        if let RepoError::Store(store_err) = err {
            error!(
                "event=repo_error module=error status=error error_code=internal error={}",
                store_err
            );
            return Self {
                origin: ERROR_ORIGIN,
                code: err.code(),
                message: INTERNAL_ERROR_MESSAGE.to_string(),
                name: None,
            };
        }

        let name = match err {
            RepoError::InvalidField { name, .. } => Some(name.clone()),
            _ => None,
        };
        Self {
            origin: ERROR_ORIGIN,
            code: err.code(),
            message: err.to_string(),
            name,
        }
    }
}
