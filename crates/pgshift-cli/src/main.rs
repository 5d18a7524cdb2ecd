//! PgShift - Postgres to Redshift bulk transfer tool

use anyhow::Result;
use clap::Parser;
use pgshift_cli::{commands, Config};
use pgshift_common::logging::{init_logging, LogConfig, LogLevel};
use pgshift_transfer::{CopyOptions, UnloadOptions};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pgshift")]
#[command(author, version, about = "Postgres to Redshift bulk transfer tool")]
struct Cli {
    /// Transfer to run
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Copy a Postgres table or query into a warehouse table
    Copy {
        /// Warehouse table receiving the data
        #[arg(long)]
        target: String,

        /// Source table to extract
        #[arg(long, conflicts_with = "query")]
        table: Option<String>,

        /// Source SELECT statement to extract instead of a whole table
        #[arg(long)]
        query: Option<String>,

        /// Object store bucket staged chunks land in
        #[arg(long, env = "PGSHIFT_BUCKET")]
        bucket: String,

        /// Key prefix for staged chunks and manifests
        #[arg(long, default_value = "pgshift/")]
        prefix: String,

        /// Statement run in the final load transaction, before its COPY
        #[arg(long)]
        delete_statement: Option<String>,

        /// Upper bound on manifest entries per load batch
        #[arg(long)]
        manifest_max_keys: Option<usize>,

        /// Uncompressed bytes per chunk file before rolling over
        #[arg(long)]
        max_chunk_bytes: Option<u64>,

        /// Keep staged objects in the store when the run fails
        #[arg(long)]
        keep_on_failure: bool,
    },

    /// Load a JSON file of records into a warehouse table
    LoadJson {
        /// File holding a JSON array of records
        file: PathBuf,

        /// Warehouse table receiving the data
        #[arg(long)]
        target: String,

        /// Object store bucket staged chunks land in
        #[arg(long, env = "PGSHIFT_BUCKET")]
        bucket: String,

        /// Key prefix for staged chunks and manifests
        #[arg(long, default_value = "pgshift/")]
        prefix: String,

        /// Statement run in the final load transaction, before its COPY
        #[arg(long)]
        delete_statement: Option<String>,

        /// Keep staged objects in the store when the run fails
        #[arg(long)]
        keep_on_failure: bool,
    },

    /// Export a warehouse table to the object store as gzipped JSON
    Unload {
        /// Warehouse table to export
        table: String,

        /// Object store bucket the export is written to
        #[arg(long, env = "PGSHIFT_BUCKET")]
        bucket: String,

        /// Key prefix the export is written under
        #[arg(long, default_value = "pgshift/")]
        prefix: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("pgshift".to_string())
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    match cli.command {
        Command::Copy {
            target,
            table,
            query,
            bucket,
            prefix,
            delete_statement,
            manifest_max_keys,
            max_chunk_bytes,
            keep_on_failure,
        } => {
            let config = Config::load(bucket)?;
            let mut options = CopyOptions::new(target, prefix);
            if let Some(table) = table {
                options = options.from_table(table);
            }
            if let Some(query) = query {
                options = options.from_select(query);
            }
            if let Some(statement) = delete_statement {
                options = options.delete_statement(statement);
            }
            if let Some(bound) = manifest_max_keys {
                options = options.manifest_max_keys(bound);
            }
            if let Some(bytes) = max_chunk_bytes {
                options = options.max_chunk_bytes(bytes);
            }
            options = options.cleanup_on_failure(!keep_on_failure);

            info!("Copying into the warehouse");
            commands::copy(&config, options).await?;
        },
        Command::LoadJson {
            file,
            target,
            bucket,
            prefix,
            delete_statement,
            keep_on_failure,
        } => {
            let config = Config::load(bucket)?;
            let mut options = CopyOptions::new(target, prefix);
            if let Some(statement) = delete_statement {
                options = options.delete_statement(statement);
            }
            options = options.cleanup_on_failure(!keep_on_failure);

            info!("Loading records into the warehouse");
            commands::load_json(&config, &file, options).await?;
        },
        Command::Unload {
            table,
            bucket,
            prefix,
        } => {
            let config = Config::load(bucket)?;
            let options = UnloadOptions::new(table, prefix);

            info!("Unloading from the warehouse");
            commands::unload(&config, options).await?;
        },
    }

    info!("Run complete");
    Ok(())
}
