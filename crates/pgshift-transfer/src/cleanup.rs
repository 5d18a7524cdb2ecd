//! Best-effort removal of uploaded objects after a failed run.

use tracing::{info, warn};

use crate::storage::ObjectStore;

/// Delete every uploaded object of a failed run.
///
/// Deletion failures are logged and skipped, never raised, so the error
/// that triggered the cleanup stays the one the caller reports.
pub(crate) async fn remove_uploaded_objects(store: &dyn ObjectStore, keys: &[String]) {
    if keys.is_empty() {
        return;
    }

    let mut removed = 0usize;
    for key in keys {
        match store.delete_object(key).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(key = %key, error = %e, "Failed to delete object during cleanup"),
        }
    }

    info!(
        removed,
        total = keys.len(),
        "Removed uploaded objects after failed run"
    );
}
