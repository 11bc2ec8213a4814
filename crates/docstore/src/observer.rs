//! Hooks for the store's non-fatal events.
//!
//! The store reports anomalies it recovers from here instead of writing to
//! any particular sink. [`TracingObserver`] is the default.

use tracing::{debug, warn};

use docstore_index::IndexRows;

use crate::error::MirrorError;
use crate::query::QueryWarning;

pub trait StoreObserver: Send + Sync {
    /// A query ignored part of its criteria.
    fn query_warning(&self, _warning: &QueryWarning) {}

    /// The filesystem mirror could not be written. The write itself stood.
    fn mirror_failed(&self, _uuid: &str, _error: &MirrorError) {}

    /// A commit was rejected and the write is about to be retried.
    fn write_retried(&self, _uuid: &str, _attempt: u32) {}

    fn index_refreshed(&self, _rows: &IndexRows) {}
}

/// Forwards every event to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl StoreObserver for TracingObserver {
    fn query_warning(&self, warning: &QueryWarning) {
        warn!("{}", warning);
    }

    fn mirror_failed(&self, uuid: &str, error: &MirrorError) {
        warn!(uuid, "mirror write failed: {}", error);
    }

    fn write_retried(&self, uuid: &str, attempt: u32) {
        warn!(uuid, attempt, "commit rejected, retrying");
    }

    fn index_refreshed(&self, rows: &IndexRows) {
        debug!(uuid = %rows.uuid, tags = rows.tags.len(), "index refreshed");
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl StoreObserver for NoopObserver {}
