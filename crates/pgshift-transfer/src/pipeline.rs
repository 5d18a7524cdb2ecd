//! The transfer pipeline: chunked extraction, concurrent upload, manifest
//! partitioning, and sequential transactional loads, with cleanup of staged
//! objects when a run fails partway.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::TryStreamExt;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use pgshift_common::{PgShiftError, RedshiftCredentials, Result};

use crate::chunk::{collapse_quote_escapes, ChunkFileSet, ChunkStats, LineBuffer};
use crate::cleanup::remove_uploaded_objects;
use crate::config::{CopyOptions, UnloadOptions};
use crate::loader::BatchLoader;
use crate::manifest::{build_batches, RunToken};
use crate::source::RecordSource;
use crate::storage::ObjectStore;
use crate::unload::{unload_destination, unload_statement};
use crate::uploader::UploadWorker;
use crate::warehouse::Warehouse;

/// What a completed copy run moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    /// Records written into chunk files.
    pub records: u64,
    /// Chunk files produced and uploaded.
    pub chunk_files: usize,
    /// Objects staged in the store: chunk files plus manifests.
    pub uploaded_keys: usize,
    /// Load transactions committed.
    pub batches: usize,
}

/// Coordinates one transfer at a time over a fixed set of collaborators.
///
/// The pipeline owns no durable state; everything a run accumulates lives in
/// the run and is gone when it returns.
pub struct TransferPipeline {
    source: Arc<dyn RecordSource>,
    warehouse: Arc<dyn Warehouse>,
    store: Arc<dyn ObjectStore>,
    credentials: RedshiftCredentials,
}

impl TransferPipeline {
    pub fn new(
        source: Arc<dyn RecordSource>,
        warehouse: Arc<dyn Warehouse>,
        store: Arc<dyn ObjectStore>,
        credentials: RedshiftCredentials,
    ) -> Self {
        Self {
            source,
            warehouse,
            store,
            credentials,
        }
    }

    /// Copy a source table or select result into the warehouse target.
    ///
    /// Fails fast, before any scratch or store side effect, when the options
    /// are invalid or the target table does not exist. After that point any
    /// failure triggers cleanup of the objects staged so far (unless
    /// disabled), and the causing error is returned.
    #[instrument(skip(self, options), fields(table = %options.target_table))]
    pub async fn copy_table(&self, options: &CopyOptions) -> Result<TransferReport> {
        options.validate()?;
        let query = options.source_query()?;
        self.ensure_target_exists(&options.target_table).await?;

        let scratch = self.create_scratch_dir(options)?;
        let stream = self.source.stream_json_rows(&query).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = UploadWorker::spawn(self.store.clone(), options.key_prefix.clone(), rx);
        let sink = ChunkFileSet::new(scratch.path(), options.max_chunk_bytes, tx);

        let produced = drain_stream(stream, sink).await;
        let outcome = worker.finish().await?;

        let stats = match (produced, outcome.error) {
            // An upload failure is the root cause even when the writer also
            // failed afterward because its channel went away.
            (_, Some(upload_error)) => {
                return Err(self
                    .fail_run(upload_error, &outcome.keys, options.cleanup_on_failure)
                    .await);
            }
            (Err(e), None) => {
                return Err(self
                    .fail_run(e, &outcome.keys, options.cleanup_on_failure)
                    .await);
            }
            (Ok(stats), None) => stats,
        };

        self.load_uploaded(options, stats, outcome.keys).await
    }

    /// Load caller-supplied records through the same chunk, upload, and
    /// batch-load path as [`copy_table`](Self::copy_table). Records are
    /// serialized locally, so no wire-format normalization applies.
    #[instrument(skip(self, records, options), fields(table = %options.target_table))]
    pub async fn copy_records<I>(&self, records: I, options: &CopyOptions) -> Result<TransferReport>
    where
        I: IntoIterator<Item = serde_json::Value>,
    {
        options.validate()?;
        self.ensure_target_exists(&options.target_table).await?;

        let scratch = self.create_scratch_dir(options)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = UploadWorker::spawn(self.store.clone(), options.key_prefix.clone(), rx);
        let sink = ChunkFileSet::new(scratch.path(), options.max_chunk_bytes, tx);

        let produced = write_records(records, sink);
        let outcome = worker.finish().await?;

        let stats = match (produced, outcome.error) {
            (_, Some(upload_error)) => {
                return Err(self
                    .fail_run(upload_error, &outcome.keys, options.cleanup_on_failure)
                    .await);
            }
            (Err(e), None) => {
                return Err(self
                    .fail_run(e, &outcome.keys, options.cleanup_on_failure)
                    .await);
            }
            (Ok(stats), None) => stats,
        };

        self.load_uploaded(options, stats, outcome.keys).await
    }

    /// Export a warehouse table to the object store as gzipped JSON, one
    /// statement executed warehouse-side.
    #[instrument(skip(self, options), fields(table = %options.table))]
    pub async fn unload_table(&self, options: &UnloadOptions) -> Result<()> {
        let columns = self.warehouse.table_columns(&options.table).await?;
        if columns.is_empty() {
            return Err(PgShiftError::target_not_found(&options.table));
        }

        let destination =
            unload_destination(self.store.bucket(), &options.key_prefix, &options.table);
        let statement =
            unload_statement(&options.table, &columns, &destination, &self.credentials);

        info!(
            table = %options.table,
            destination = %destination,
            columns = columns.len(),
            "Unloading table"
        );

        self.warehouse.execute_in_transaction(&[statement]).await
    }

    async fn ensure_target_exists(&self, table: &str) -> Result<()> {
        if self.warehouse.table_exists(table).await? {
            Ok(())
        } else {
            Err(PgShiftError::target_not_found(table))
        }
    }

    /// Per-run scratch directory, removed on drop whatever the run outcome.
    /// The cleanup flag only governs objects already in the store.
    fn create_scratch_dir(&self, options: &CopyOptions) -> Result<tempfile::TempDir> {
        let builder_dir = match &options.scratch_dir {
            Some(parent) => tempfile::Builder::new().prefix("pgshift-").tempdir_in(parent),
            None => tempfile::Builder::new().prefix("pgshift-").tempdir(),
        };
        Ok(builder_dir?)
    }

    /// Partition the uploaded keys into manifests and apply them in order.
    async fn load_uploaded(
        &self,
        options: &CopyOptions,
        stats: ChunkStats,
        mut keys: Vec<String>,
    ) -> Result<TransferReport> {
        info!(
            records = stats.records,
            chunk_files = stats.files,
            "Extraction and upload complete"
        );

        let run = RunToken::generate();
        let batches = build_batches(
            self.store.bucket(),
            &options.key_prefix,
            &run,
            &keys,
            options.manifest_max_keys,
        );

        let loader = BatchLoader {
            store: self.store.as_ref(),
            warehouse: self.warehouse.as_ref(),
            credentials: &self.credentials,
        };
        if let Err(e) = loader
            .apply(
                &options.target_table,
                options.delete_statement.as_deref(),
                &batches,
                &mut keys,
            )
            .await
        {
            return Err(self.fail_run(e, &keys, options.cleanup_on_failure).await);
        }

        let report = TransferReport {
            records: stats.records,
            chunk_files: stats.files,
            uploaded_keys: keys.len(),
            batches: batches.len(),
        };
        info!(
            records = report.records,
            chunk_files = report.chunk_files,
            uploaded_keys = report.uploaded_keys,
            batches = report.batches,
            table = %options.target_table,
            "Transfer complete"
        );
        Ok(report)
    }

    /// Clean up staged objects (unless disabled) and hand the causing error
    /// back for the caller to return.
    async fn fail_run(&self, error: PgShiftError, keys: &[String], cleanup: bool) -> PgShiftError {
        if cleanup {
            remove_uploaded_objects(self.store.as_ref(), keys).await;
        } else if !keys.is_empty() {
            warn!(
                retained = keys.len(),
                "Cleanup disabled; staged objects retained"
            );
        }
        error
    }
}

/// Drive the source stream into the chunk sink, reassembling lines and
/// normalizing the wire format's doubled backslash escapes.
async fn drain_stream(
    mut stream: BoxStream<'static, Result<Vec<u8>>>,
    mut sink: ChunkFileSet,
) -> Result<ChunkStats> {
    let mut lines = LineBuffer::new();
    while let Some(chunk) = stream.try_next().await? {
        lines.feed(&chunk, |line| {
            sink.write_line(collapse_quote_escapes(line).as_ref())
        })?;
    }
    if let Some(line) = lines.finish() {
        sink.write_line(collapse_quote_escapes(&line).as_ref())?;
    }
    sink.finish()
}

/// Serialize records one per line into the chunk sink.
fn write_records<I>(records: I, mut sink: ChunkFileSet) -> Result<ChunkStats>
where
    I: IntoIterator<Item = serde_json::Value>,
{
    for record in records {
        let line = serde_json::to_vec(&record)?;
        sink.write_line(&line)?;
    }
    sink.finish()
}
