//! Transactional core of the toybox board.
//! Members, posts and toggle votes persisted through an injectable entity store.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::CoreConfig;
pub use error::{BusinessRuleViolation, ErrorKind, ErrorPayload, RepoError, RepoResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::key::{EntityKey, EntityKind, PostId, VoteId};
pub use model::member::Member;
pub use model::post::{Post, PostView};
pub use model::vote::{Vote, VoteValue};
pub use repo::member_repo::MemberRepository;
pub use repo::post_repo::PostRepository;
pub use repo::vote_repo::{VoteRepository, MAX_POSTS_IN_LIST};
pub use service::board_service::MAX_MEMBERS_IN_LIST;
pub use service::{BoardService, MemberProfile, MemberSummary, Registration};
pub use store::{EntityStore, MemoryStore, SqliteStore, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
