use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use sqlx::postgres::{PgPool, PgPoolCopyExt};
use tracing::instrument;

use pgshift_common::{PgShiftError, Result};

/// What to read out of the source database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceQuery {
    /// Every row of the named table.
    Table(String),
    /// The rows produced by an arbitrary SELECT statement.
    Select(String),
}

impl SourceQuery {
    fn relation(&self) -> String {
        match self {
            Self::Table(name) => name.clone(),
            Self::Select(sql) => format!("({sql})"),
        }
    }

    /// The COPY statement that streams the query out as one JSON document
    /// per line.
    pub(crate) fn copy_out_statement(&self) -> String {
        format!(
            "COPY (SELECT row_to_json(t) FROM {} AS t) TO STDOUT",
            self.relation()
        )
    }
}

/// A source of newline-delimited JSON row data.
///
/// The stream yields raw byte slices; record boundaries are newlines and may
/// fall anywhere inside or between items, so consumers must reassemble lines
/// themselves.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn stream_json_rows(
        &self,
        query: &SourceQuery,
    ) -> Result<BoxStream<'static, Result<Vec<u8>>>>;
}

/// Streams rows out of a Postgres database with `COPY ... TO STDOUT`,
/// serializing each row to JSON on the server side.
pub struct PostgresSource {
    pool: PgPool,
}

impl PostgresSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSource for PostgresSource {
    #[instrument(skip(self))]
    async fn stream_json_rows(
        &self,
        query: &SourceQuery,
    ) -> Result<BoxStream<'static, Result<Vec<u8>>>> {
        let statement = query.copy_out_statement();
        tracing::debug!(statement = %statement, "Starting COPY OUT stream");

        let stream = self
            .pool
            .copy_out_raw(&statement)
            .await
            .map_err(|e| PgShiftError::extraction(e.to_string()))?;

        Ok(stream
            .map(|item| {
                item.map(|bytes| bytes.to_vec())
                    .map_err(|e| PgShiftError::extraction(e.to_string()))
            })
            .boxed())
    }
}
