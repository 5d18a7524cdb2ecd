use std::path::PathBuf;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use pgshift_common::{PgShiftError, Result};

use crate::source::SourceQuery;

/// Default uncompressed size bound for a single chunk file: 100 MB.
pub const DEFAULT_MAX_CHUNK_BYTES: u64 = 104_857_600;

/// Connection settings for one of the two databases a transfer touches
/// (the Postgres source or the Redshift warehouse).
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            connect_timeout_secs: 30,
        }
    }

    /// Read connection settings from the environment. `url_var` names the
    /// variable holding the connection URL, so the source and warehouse
    /// sides can be configured independently.
    pub fn from_env(url_var: &str) -> Result<Self> {
        let url = std::env::var(url_var)
            .map_err(|_| PgShiftError::configuration(format!("{url_var} not set")))?;

        let max_connections = std::env::var("PGSHIFT_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let connect_timeout_secs = std::env::var("PGSHIFT_DB_CONNECT_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            url,
            max_connections,
            connect_timeout_secs,
        })
    }

    pub async fn create_pool(&self) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .connect(&self.url)
            .await
            .map_err(|e| PgShiftError::database(e.to_string()))?;

        tracing::info!(
            max_connections = self.max_connections,
            "Database connection pool created"
        );

        Ok(pool)
    }
}

/// Knobs for a single chunked copy run.
///
/// Exactly one of `source_table` and `source_select` must be set before the
/// run starts; everything else has a usable default.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Warehouse table the data lands in.
    pub target_table: String,
    /// Object store prefix under which chunk files and manifests are keyed.
    pub key_prefix: String,
    /// Copy every row of this source table.
    pub source_table: Option<String>,
    /// Copy the result of this SELECT statement instead of a whole table.
    pub source_select: Option<String>,
    /// Parent directory for the per-run scratch directory. Defaults to the
    /// system temp directory.
    pub scratch_dir: Option<PathBuf>,
    /// Delete already-uploaded objects when the run fails.
    pub cleanup_on_failure: bool,
    /// Statement run inside the final load transaction, before its COPY.
    pub delete_statement: Option<String>,
    /// Upper bound on keys per manifest. `None` loads everything in one batch.
    pub manifest_max_keys: Option<usize>,
    /// Uncompressed size bound for a single chunk file.
    pub max_chunk_bytes: u64,
}

impl CopyOptions {
    pub fn new(target_table: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            target_table: target_table.into(),
            key_prefix: normalize_prefix(&key_prefix.into()),
            source_table: None,
            source_select: None,
            scratch_dir: None,
            cleanup_on_failure: true,
            delete_statement: None,
            manifest_max_keys: None,
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
        }
    }

    pub fn from_table(mut self, table: impl Into<String>) -> Self {
        self.source_table = Some(table.into());
        self
    }

    pub fn from_select(mut self, select: impl Into<String>) -> Self {
        self.source_select = Some(select.into());
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn cleanup_on_failure(mut self, cleanup: bool) -> Self {
        self.cleanup_on_failure = cleanup;
        self
    }

    pub fn delete_statement(mut self, statement: impl Into<String>) -> Self {
        self.delete_statement = Some(statement.into());
        self
    }

    pub fn manifest_max_keys(mut self, max_keys: usize) -> Self {
        self.manifest_max_keys = Some(max_keys);
        self
    }

    pub fn max_chunk_bytes(mut self, bytes: u64) -> Self {
        self.max_chunk_bytes = bytes;
        self
    }

    /// Check the size and naming knobs that every run relies on.
    pub fn validate(&self) -> Result<()> {
        if self.target_table.trim().is_empty() {
            return Err(PgShiftError::configuration(
                "target table name must not be empty",
            ));
        }
        if self.max_chunk_bytes == 0 {
            return Err(PgShiftError::configuration(
                "max_chunk_bytes must be greater than zero",
            ));
        }
        if self.manifest_max_keys == Some(0) {
            return Err(PgShiftError::configuration(
                "manifest_max_keys must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Resolve the exactly-one-of source pair into a concrete query.
    pub fn source_query(&self) -> Result<SourceQuery> {
        match (&self.source_table, &self.source_select) {
            (Some(table), None) => Ok(SourceQuery::Table(table.clone())),
            (None, Some(select)) => Ok(SourceQuery::Select(select.clone())),
            (Some(_), Some(_)) => Err(PgShiftError::configuration(
                "source_table and source_select are mutually exclusive; supply only one",
            )),
            (None, None) => Err(PgShiftError::configuration(
                "either source_table or source_select is required",
            )),
        }
    }
}

/// Knobs for unloading a warehouse table back into the object store.
#[derive(Debug, Clone)]
pub struct UnloadOptions {
    pub table: String,
    pub key_prefix: String,
}

impl UnloadOptions {
    pub fn new(table: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_prefix: normalize_prefix(&key_prefix.into()),
        }
    }
}

/// Object keys never start with a slash, and a non-empty prefix always ends
/// with one so filenames can be appended directly.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}
