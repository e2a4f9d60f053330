//! Use-case layer above the repositories.

pub mod board_service;

pub use board_service::{BoardService, MemberProfile, MemberSummary, Registration};
