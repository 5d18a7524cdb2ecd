use async_trait::async_trait;
use futures::FutureExt;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{debug, instrument};

use pgshift_common::{PgShiftError, Result};

/// Name and declared type of one warehouse column, in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// Warehouse-side operations a transfer run needs.
///
/// Table names may be schema-qualified (`schema.table`); a bare name matches
/// in any schema.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Columns of the table in ordinal position order. Empty when the table
    /// does not exist.
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Run the statements inside a single transaction, committing only when
    /// every one of them succeeds.
    async fn execute_in_transaction(&self, statements: &[String]) -> Result<()>;
}

/// Redshift warehouse reached over its Postgres-compatible wire protocol.
pub struct RedshiftWarehouse {
    pool: PgPool,
}

impl RedshiftWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Warehouse for RedshiftWarehouse {
    #[instrument(skip(self))]
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let (schema, name) = split_table_name(table);

        let row = match schema {
            Some(schema) => {
                sqlx::query(
                    "SELECT 1 FROM information_schema.tables \
                     WHERE table_schema = $1 AND table_name = $2",
                )
                .bind(schema)
                .bind(name)
                .fetch_optional(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT 1 FROM information_schema.tables WHERE table_name = $1")
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await
            }
        }
        .map_err(|e| PgShiftError::database(e.to_string()))?;

        Ok(row.is_some())
    }

    #[instrument(skip(self))]
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let (schema, name) = split_table_name(table);

        // information_schema identifiers decode cleanly only as text.
        let rows = match schema {
            Some(schema) => {
                sqlx::query(
                    "SELECT column_name::text, data_type::text \
                     FROM information_schema.columns \
                     WHERE table_schema = $1 AND table_name = $2 \
                     ORDER BY ordinal_position",
                )
                .bind(schema)
                .bind(name)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT column_name::text, data_type::text \
                     FROM information_schema.columns \
                     WHERE table_name = $1 \
                     ORDER BY ordinal_position",
                )
                .bind(name)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| PgShiftError::database(e.to_string()))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(ColumnInfo {
                name: row
                    .try_get(0)
                    .map_err(|e| PgShiftError::database(e.to_string()))?,
                data_type: row
                    .try_get(1)
                    .map_err(|e| PgShiftError::database(e.to_string()))?,
            });
        }

        Ok(columns)
    }

    #[instrument(skip(self, statements))]
    async fn execute_in_transaction(&self, statements: &[String]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PgShiftError::database(e.to_string()))?;

        for statement in statements {
            debug!(statement = %statement, "Executing statement in transaction");
            // Simple query protocol; Redshift rejects COPY and UNLOAD as
            // prepared statements. Boxed because the compiler cannot prove
            // the unboxed executor future `Send` inside this async_trait
            // generator (rust-lang/rust#102211).
            sqlx::raw_sql(statement)
                .execute(&mut *tx)
                .boxed()
                .await
                .map_err(|e| PgShiftError::database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| PgShiftError::database(e.to_string()))?;

        Ok(())
    }
}

fn split_table_name(table: &str) -> (Option<&str>, &str) {
    match table.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table),
    }
}
