//! Best-effort activity logging.
//!
//! Logging an admin action must never fail or slow down the action
//! itself, so writes are dispatched onto a background task after the
//! triggering operation commits. A failed write is visible in the logs
//! and nowhere else.

use std::sync::Arc;

use tracing::warn;

use crate::db::{ActivityStore, RepositoryError};
use crate::models::{ActivityFilter, ActivityLogEntry, NewActivityLog, Page, Pagination};

/// Fire-and-forget activity log.
#[derive(Clone)]
pub struct ActivityLogger {
    store: Arc<dyn ActivityStore>,
}

impl ActivityLogger {
    /// Create a logger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self { store }
    }

    /// Record an entry on a background task.
    ///
    /// Returns immediately; storage failures are logged at `warn` and
    /// never surface to the caller.
    pub fn record(&self, entry: NewActivityLog) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.insert(entry).await {
                warn!(error = %e, "failed to record activity log entry");
            }
        });
    }

    /// Admin listing of recorded entries.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the query fails.
    pub async fn list(
        &self,
        filter: &ActivityFilter,
        pagination: Pagination,
    ) -> Result<Page<ActivityLogEntry>, RepositoryError> {
        self.store.list(filter, pagination).await
    }
}
