//! PgShift CLI Library
//!
//! Command-line interface for bulk transfers between Postgres and a
//! Redshift warehouse through an S3-compatible object store.
//!
//! # Overview
//!
//! The `pgshift` binary wraps the transfer pipeline in three commands:
//!
//! - **Copy**: stream a source table or query into a warehouse table (`pgshift copy`)
//! - **Load**: push a JSON file of records into a warehouse table (`pgshift load-json`)
//! - **Unload**: export a warehouse table back to the object store (`pgshift unload`)
//!
//! Connection settings come from the environment (see [`config::Config`]);
//! per-run knobs come from command-line flags.

pub mod commands;
pub mod config;

pub use config::Config;
