//! Store settings: table names, the optional mirror, retry policy and the
//! TOML file that carries them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use docstore_db::DatabaseConfig;
use docstore_types::TableNames;

use crate::error::ConfigError;

/// How the write path reacts to commits rejected by a conflicting writer.
///
/// The delay after the n-th rejection is `n * backoff_ms`, capped at
/// `max_backoff_ms`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total commit attempts per write. `None` retries forever.
    pub max_attempts: Option<u32>,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(32),
            backoff_ms: 2,
            max_backoff_ms: 100,
        }
    }
}

impl RetryPolicy {
    /// Retry until the commit goes through.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            ..Self::default()
        }
    }

    /// No waiting between attempts. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before the next attempt after `failed` rejected commits, or
    /// `None` once the attempt budget is spent.
    pub fn delay_after(&self, failed: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| failed >= max) {
            return None;
        }
        let ms = self
            .backoff_ms
            .saturating_mul(u64::from(failed))
            .min(self.max_backoff_ms);
        Some(Duration::from_millis(ms))
    }
}

/// Store-level settings: table names, mirror location and retry behavior.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub tables: TableNames,
    /// Root of the filesystem mirror. Mirroring is off when unset.
    pub mirror_root: Option<PathBuf>,
    pub retry: RetryPolicy,
}

/// Everything a process needs to open a store, as read from a TOML file.
///
/// ```toml
/// [database]
/// path = "docs.db"
/// table_prefix = "app_"
///
/// [store]
/// mirror_root = "/var/cache/docs"
///
/// [store.retry]
/// max_attempts = 8
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub store: StoreConfig,
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
