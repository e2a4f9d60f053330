//! Domain model for members, posts and votes.
//!
//! # Responsibility
//! - Define immutable value structs persisted through the store port.
//! - Keep identity encoding and vote state rules next to the data they guard.
//!
//! # Invariants
//! - Mutating helpers return new values with `version + 1`; stored values are
//!   never edited in place.
//! - Timestamps are Unix epoch milliseconds.

pub mod key;
pub mod member;
pub mod post;
pub mod vote;

use std::time::{SystemTime, UNIX_EPOCH};

/// Payload stored when a caller supplies a blank one.
pub const EMPTY_PAYLOAD: &str = "{}";

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
