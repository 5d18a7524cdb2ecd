//! Sequential loading of uploaded chunks into the warehouse, one manifest
//! and one transaction per batch.

use tracing::info;

use pgshift_common::{PgShiftError, RedshiftCredentials, Result};

use crate::manifest::{object_url, ManifestBatch};
use crate::storage::ObjectStore;
use crate::warehouse::Warehouse;

pub(crate) struct BatchLoader<'a> {
    pub store: &'a dyn ObjectStore,
    pub warehouse: &'a dyn Warehouse,
    pub credentials: &'a RedshiftCredentials,
}

impl BatchLoader<'_> {
    /// Write each batch's manifest and run its COPY transaction, strictly in
    /// batch order. A batch only starts after every earlier one committed.
    ///
    /// Manifest keys are pushed onto `uploaded_keys` before the write, so a
    /// failure at any point leaves the key list covering everything that may
    /// exist in the store. The delete statement, when supplied, joins the
    /// final batch's transaction ahead of its COPY.
    pub(crate) async fn apply(
        &self,
        target_table: &str,
        delete_statement: Option<&str>,
        batches: &[ManifestBatch],
        uploaded_keys: &mut Vec<String>,
    ) -> Result<()> {
        for (index, batch) in batches.iter().enumerate() {
            let batch_no = index + 1;
            let is_last = batch_no == batches.len();

            uploaded_keys.push(batch.manifest_key.clone());
            let body = serde_json::to_vec(&batch.manifest)?;
            self.store.put_object(&batch.manifest_key, body).await?;

            let manifest_url = object_url(self.store.bucket(), &batch.manifest_key);
            let mut statements = Vec::new();
            if is_last {
                if let Some(delete) = delete_statement {
                    statements.push(delete.to_string());
                }
            }
            statements.push(copy_statement(target_table, &manifest_url, self.credentials));

            info!(
                batch = batch_no,
                total = batches.len(),
                manifest = %batch.manifest_key,
                objects = batch.manifest.entries.len(),
                "Loading batch"
            );

            self.warehouse
                .execute_in_transaction(&statements)
                .await
                .map_err(|e| PgShiftError::load(batch_no, e.to_string()))?;
        }

        Ok(())
    }
}

fn copy_statement(table: &str, manifest_url: &str, credentials: &RedshiftCredentials) -> String {
    format!(
        "COPY {table}\nFROM '{manifest_url}'\nCREDENTIALS '{creds}'\nMANIFEST\nTIMEFORMAT 'auto'\nGZIP\nJSON 'auto'",
        creds = credentials.credentials_string(),
    )
}
