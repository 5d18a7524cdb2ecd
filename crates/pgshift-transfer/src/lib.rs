//! Chunked bulk transfer from Postgres into Redshift by way of an
//! S3-compatible object store.
//!
//! A copy run streams the source query out as size-bounded gzip chunk files,
//! uploads them concurrently with extraction, partitions the uploaded keys
//! into load manifests, and applies each manifest in its own warehouse
//! transaction. Failed runs clean their staged objects back out of the
//! store. The reverse direction exports a warehouse table as gzipped JSON
//! with a generated UNLOAD statement.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod manifest;
pub mod pipeline;
pub mod source;
pub mod storage;
pub mod warehouse;

mod chunk;
mod cleanup;
mod loader;
mod unload;
mod uploader;

pub use config::{CopyOptions, DatabaseConfig, UnloadOptions, DEFAULT_MAX_CHUNK_BYTES};
pub use pipeline::{TransferPipeline, TransferReport};
pub use source::{PostgresSource, RecordSource, SourceQuery};
pub use storage::{ObjectStore, S3Config, S3Store};
pub use warehouse::{ColumnInfo, RedshiftWarehouse, Warehouse};
