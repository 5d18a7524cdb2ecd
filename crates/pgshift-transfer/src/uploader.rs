//! Background worker that drains finalized chunk files into the object
//! store while extraction keeps running.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pgshift_common::{PgShiftError, Result};

use crate::storage::ObjectStore;

/// What the worker accomplished by the time its channel drained or an
/// upload failed.
pub(crate) struct UploadOutcome {
    /// Keys uploaded so far, in upload order. Kept even when `error` is
    /// set, so the caller can clean them up.
    pub keys: Vec<String>,
    /// First upload failure. The worker stops at the first one; files still
    /// queued behind it stay on disk.
    pub error: Option<PgShiftError>,
}

/// Handle to the spawned upload task.
pub(crate) struct UploadWorker {
    handle: JoinHandle<UploadOutcome>,
}

impl UploadWorker {
    /// Spawn the worker. It uploads files in the order they arrive on
    /// `files`, keyed as `key_prefix` plus the filename, and removes each
    /// local file once its upload lands.
    pub(crate) fn spawn(
        store: Arc<dyn ObjectStore>,
        key_prefix: String,
        mut files: UnboundedReceiver<PathBuf>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut outcome = UploadOutcome {
                keys: Vec::new(),
                error: None,
            };

            while let Some(path) = files.recv().await {
                let filename = match path.file_name().and_then(|n| n.to_str()) {
                    Some(name) => name.to_string(),
                    None => {
                        outcome.error = Some(PgShiftError::upload(
                            path.display().to_string(),
                            "chunk file has no usable filename",
                        ));
                        break;
                    }
                };
                let key = format!("{key_prefix}{filename}");

                let data = match tokio::fs::read(&path).await {
                    Ok(data) => data,
                    Err(e) => {
                        outcome.error = Some(PgShiftError::upload(
                            &key,
                            format!("failed to read chunk file: {e}"),
                        ));
                        break;
                    }
                };

                match store.put_object(&key, data).await {
                    Ok(()) => {
                        debug!(key = %key, "Uploaded chunk file");
                        outcome.keys.push(key);
                        if let Err(e) = tokio::fs::remove_file(&path).await {
                            warn!(
                                path = %path.display(),
                                error = %e,
                                "Failed to remove uploaded chunk file"
                            );
                        }
                    }
                    Err(e) => {
                        outcome.error = Some(e);
                        break;
                    }
                }
            }

            info!(uploaded = outcome.keys.len(), "Upload worker finished");
            outcome
        });

        Self { handle }
    }

    /// Wait for the worker to stop. The outcome is returned even when an
    /// upload failed; the join itself only fails if the task panicked.
    pub(crate) async fn finish(self) -> Result<UploadOutcome> {
        self.handle
            .await
            .map_err(|e| PgShiftError::unknown(format!("upload worker task failed: {e}")))
    }
}
