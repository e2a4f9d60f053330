//! Runtime configuration for hosts embedding the core.
//!
//! # Responsibility
//! - Hold log level, log directory and database location.
//! - Layer `TOYBOX_*` environment overrides over built-in defaults.

use crate::logging::default_log_level;
use std::path::PathBuf;

pub const ENV_LOG_LEVEL: &str = "TOYBOX_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "TOYBOX_LOG_DIR";
pub const ENV_DB_PATH: &str = "TOYBOX_DB_PATH";

const DEFAULT_DB_FILE: &str = "toybox.sqlite3";
const DEFAULT_LOG_SUBDIR: &str = "toybox-logs";

/// Core settings. `db_path == None` selects an in-memory database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub db_path: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: std::env::temp_dir().join(DEFAULT_LOG_SUBDIR),
            db_path: Some(PathBuf::from(DEFAULT_DB_FILE)),
        }
    }
}

impl CoreConfig {
    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by `lookup`; blank values are ignored.
    ///
    /// `TOYBOX_DB_PATH=:memory:` selects an in-memory database.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = (path != ":memory:").then(|| PathBuf::from(path));
        }
        config
    }
}
