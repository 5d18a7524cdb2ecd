//! Configuration management for the pgshift binary
//!
//! Connection settings come from environment variables (with `.env` support),
//! following 12-factor principles. Per-run knobs such as the target table or
//! manifest bounds stay on the command line; this module only carries what a
//! deployment configures once.

use std::path::PathBuf;

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;

use pgshift_common::RedshiftCredentials;
use pgshift_transfer::{DatabaseConfig, S3Config};

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Connection URL for the Postgres source.
pub const SOURCE_URL_VAR: &str = "PGSHIFT_SOURCE_URL";

/// Connection URL for the Redshift warehouse.
pub const WAREHOUSE_URL_VAR: &str = "PGSHIFT_WAREHOUSE_URL";

/// Parent directory for per-run scratch directories. Defaults to the system
/// temp directory when unset.
pub const SCRATCH_DIR_VAR: &str = "PGSHIFT_SCRATCH_DIR";

/// AWS account owning the IAM role the warehouse assumes for loads.
pub const IAM_ACCOUNT_VAR: &str = "PGSHIFT_IAM_ACCOUNT";

/// Name of the IAM role the warehouse assumes for loads.
pub const IAM_ROLE_VAR: &str = "PGSHIFT_IAM_ROLE";

/// Everything a transfer run connects to.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres source settings
    pub source: DatabaseConfig,
    /// Redshift warehouse settings
    pub warehouse: DatabaseConfig,
    /// Object store settings
    pub storage: S3Config,
    /// Parent directory for chunk files while extraction runs
    pub scratch_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// The bucket comes from the command line because it varies per run;
    /// everything else is deployment-level.
    pub fn load(bucket: impl Into<String>) -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        dotenvy::dotenv().ok();

        let config = Config {
            source: DatabaseConfig::from_env(SOURCE_URL_VAR)?,
            warehouse: DatabaseConfig::from_env(WAREHOUSE_URL_VAR)?,
            storage: S3Config::from_env(bucket)?,
            scratch_dir: std::env::var(SCRATCH_DIR_VAR).ok().map(PathBuf::from),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.storage.bucket.trim().is_empty() {
            anyhow::bail!("Bucket must not be empty; pass --bucket or set PGSHIFT_BUCKET");
        }

        if self.source.max_connections == 0 {
            anyhow::bail!("Source pool size must be greater than 0");
        }

        if self.warehouse.max_connections == 0 {
            anyhow::bail!("Warehouse pool size must be greater than 0");
        }

        if let Some(dir) = &self.scratch_dir {
            if !dir.is_dir() {
                anyhow::bail!("Scratch directory does not exist: {}", dir.display());
            }
        }

        Ok(())
    }

    /// Resolve the credentials embedded in warehouse COPY and UNLOAD
    /// statements.
    ///
    /// An IAM role named through [`IAM_ACCOUNT_VAR`] and [`IAM_ROLE_VAR`]
    /// takes precedence; otherwise key material comes from the standard AWS
    /// provider chain (environment, shared config, instance metadata).
    pub async fn redshift_credentials(&self) -> Result<RedshiftCredentials> {
        let account = std::env::var(IAM_ACCOUNT_VAR).ok();
        let role = std::env::var(IAM_ROLE_VAR).ok();
        if let (Some(account_id), Some(role_name)) = (account, role) {
            return Ok(RedshiftCredentials::iam_role(account_id, role_name));
        }

        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let provider = sdk_config.credentials_provider().with_context(|| {
            format!("No AWS credentials found; set {IAM_ACCOUNT_VAR} and {IAM_ROLE_VAR} or configure access keys")
        })?;
        let credentials = provider
            .provide_credentials()
            .await
            .context("Failed to resolve AWS credentials from the provider chain")?;

        Ok(RedshiftCredentials::from(&credentials))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            source: DatabaseConfig::new("postgresql://localhost/src"),
            warehouse: DatabaseConfig::new("postgresql://localhost/wh"),
            storage: S3Config::for_minio("http://localhost:9000", "scratch", "minio", "minio123"),
            scratch_dir: None,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let mut config = base_config();
        config.storage.bucket = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let mut config = base_config();
        config.warehouse.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scratch_dir_must_exist() {
        let mut config = base_config();
        config.scratch_dir = Some(PathBuf::from("/definitely/not/a/real/directory"));
        assert!(config.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        config.scratch_dir = Some(dir.path().to_path_buf());
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_iam_role_env_takes_precedence() {
        std::env::set_var(IAM_ACCOUNT_VAR, "123456789012");
        std::env::set_var(IAM_ROLE_VAR, "RedshiftCopyUnload");

        let creds = base_config().redshift_credentials().await.unwrap();
        assert_eq!(
            creds.credentials_string(),
            "aws_iam_role=arn:aws:iam::123456789012:role/RedshiftCopyUnload"
        );

        std::env::remove_var(IAM_ACCOUNT_VAR);
        std::env::remove_var(IAM_ROLE_VAR);
    }
}
