//! Repositories over the entity store port.
//!
//! # Responsibility
//! - Enforce cross-entity invariants inside one store transaction per call.
//! - Return plain values plus typed `RepoError`s.
//!
//! # Invariants
//! - No repository queries the store while a transaction is open.
//! - Every mutating call writes all affected entities in the same
//!   transaction, or nothing at all.
//! - A blank `member_uid` is rejected before the store is touched, so every
//!   member and vote key the core writes decodes back to itself.

pub mod member_repo;
pub mod post_repo;
pub mod vote_repo;

use crate::error::{RepoError, RepoResult};
use crate::model::EMPTY_PAYLOAD;

/// Rejects an empty or whitespace-only caller identity.
pub fn require_member_uid(member_uid: &str) -> RepoResult<()> {
    if member_uid.trim().is_empty() {
        return Err(RepoError::invalid_field(
            "member_uid",
            "member identity cannot be blank",
        ));
    }
    Ok(())
}

/// Checks that `raw` is JSON; blank input becomes `{}`.
pub fn normalize_payload(field: &str, raw: &str) -> RepoResult<String> {
    if raw.trim().is_empty() {
        return Ok(EMPTY_PAYLOAD.to_string());
    }
    serde_json::from_str::<serde_json::Value>(raw)
        .map_err(|err| RepoError::invalid_field(field, format!("payload is not valid JSON: {err}")))?;
    Ok(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_payload, require_member_uid};
    use crate::error::RepoError;

    #[test]
    fn blank_payload_defaults_to_empty_object() {
        assert_eq!(normalize_payload("data", "").unwrap(), "{}");
        assert_eq!(normalize_payload("data", "  \n").unwrap(), "{}");
    }

    #[test]
    fn payload_text_is_kept_verbatim() {
        let raw = r#"{"b": 2, "a": 1}"#;
        assert_eq!(normalize_payload("data", raw).unwrap(), raw);
    }

    #[test]
    fn blank_member_uid_is_rejected() {
        for uid in ["", "   "] {
            let err = require_member_uid(uid).unwrap_err();
            assert!(matches!(err, RepoError::InvalidField { ref name, .. } if name == "member_uid"));
        }
        assert!(require_member_uid("m1").is_ok());
    }

    #[test]
    fn malformed_payload_names_the_field() {
        let err = normalize_payload("post", "{not json").unwrap_err();
        assert!(matches!(err, RepoError::InvalidField { ref name, .. } if name == "post"));
    }
}
