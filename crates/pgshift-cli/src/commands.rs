//! Command handlers wiring loaded configuration to the transfer pipeline

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use pgshift_transfer::{
    CopyOptions, PostgresSource, RedshiftWarehouse, S3Store, TransferPipeline, TransferReport,
    UnloadOptions,
};

use crate::config::Config;

/// Copy a source table or query into the warehouse.
pub async fn copy(config: &Config, options: CopyOptions) -> Result<()> {
    let options = with_scratch_dir(options, config);
    let pipeline = build_pipeline(config).await?;
    let report = pipeline.copy_table(&options).await?;
    print_report(&options.target_table, &report);
    Ok(())
}

/// Load a JSON array of records from a file into the warehouse.
pub async fn load_json(config: &Config, file: &Path, options: CopyOptions) -> Result<()> {
    let raw = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let records: Vec<serde_json::Value> = serde_json::from_slice(&raw)
        .with_context(|| format!("{} must hold a JSON array of records", file.display()))?;
    info!(records = records.len(), file = %file.display(), "Read records from file");

    let options = with_scratch_dir(options, config);
    let pipeline = build_pipeline(config).await?;
    let report = pipeline.copy_records(records, &options).await?;
    print_report(&options.target_table, &report);
    Ok(())
}

/// Export a warehouse table to the object store.
pub async fn unload(config: &Config, options: UnloadOptions) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    pipeline.unload_table(&options).await?;
    println!("Unloaded {} to the object store", options.table);
    Ok(())
}

/// Build a pipeline over the configured source, warehouse, and store.
async fn build_pipeline(config: &Config) -> Result<TransferPipeline> {
    let source_pool = config.source.create_pool().await?;
    let warehouse_pool = config.warehouse.create_pool().await?;
    let store = S3Store::new(config.storage.clone()).await?;
    let credentials = config.redshift_credentials().await?;

    Ok(TransferPipeline::new(
        Arc::new(PostgresSource::new(source_pool)),
        Arc::new(RedshiftWarehouse::new(warehouse_pool)),
        Arc::new(store),
        credentials,
    ))
}

fn with_scratch_dir(options: CopyOptions, config: &Config) -> CopyOptions {
    match &config.scratch_dir {
        Some(dir) => options.scratch_dir(dir),
        None => options,
    }
}

fn print_report(table: &str, report: &TransferReport) {
    println!(
        "Copied {} records into {} ({} chunk files, {} staged objects, {} load batches)",
        report.records, table, report.chunk_files, report.uploaded_keys, report.batches
    );
}
