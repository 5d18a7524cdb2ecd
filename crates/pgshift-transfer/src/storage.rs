use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::ServerSideEncryption,
    Client,
};
use tracing::{debug, info, instrument};

use pgshift_common::{PgShiftError, Result};

/// Connection settings for the S3-compatible object store chunk files and
/// manifests are staged in.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Custom endpoint for S3-compatible stores. `None` uses AWS.
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Path-style addressing, required by MinIO and most local stacks.
    pub path_style: bool,
}

impl S3Config {
    /// Read store settings from the environment, falling back to the
    /// standard AWS variables for credentials.
    pub fn from_env(bucket: impl Into<String>) -> Result<Self> {
        let endpoint = std::env::var("S3_ENDPOINT").ok();

        let access_key = std::env::var("S3_ACCESS_KEY")
            .or_else(|_| std::env::var("AWS_ACCESS_KEY_ID"))
            .map_err(|_| {
                PgShiftError::configuration("S3_ACCESS_KEY or AWS_ACCESS_KEY_ID not set")
            })?;

        let secret_key = std::env::var("S3_SECRET_KEY")
            .or_else(|_| std::env::var("AWS_SECRET_ACCESS_KEY"))
            .map_err(|_| {
                PgShiftError::configuration("S3_SECRET_KEY or AWS_SECRET_ACCESS_KEY not set")
            })?;

        let region = std::env::var("S3_REGION")
            .or_else(|_| std::env::var("AWS_REGION"))
            .unwrap_or_else(|_| "us-east-1".to_string());

        let path_style = std::env::var("S3_PATH_STYLE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(endpoint.is_some());

        Ok(Self {
            endpoint,
            region,
            bucket: bucket.into(),
            access_key,
            secret_key,
            path_style,
        })
    }

    /// Settings for a local MinIO instance, used by development stacks.
    pub fn for_minio(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: "us-east-1".to_string(),
            bucket: bucket.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            path_style: true,
        }
    }
}

/// Object store operations a transfer run needs.
///
/// `put_object` failures surface as `Upload` errors carrying the key, so
/// callers can tell which object never made it in.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket all keys of this store live in.
    fn bucket(&self) -> &str;

    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()>;

    async fn delete_object(&self, key: &str) -> Result<()>;
}

/// S3-backed object store.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub async fn new(config: S3Config) -> Result<Self> {
        debug!("Initializing object store with config: {:?}", config);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "pgshift-storage",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("Object store client initialized for bucket: {}", config.bucket);

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self, data))]
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let size = data.len();
        debug!("Uploading {} bytes to s3://{}/{}", size, self.bucket, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| PgShiftError::upload(key, format!("{}", DisplayErrorContext(&e))))?;

        info!("Successfully uploaded to s3://{}/{}", self.bucket, key);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, key: &str) -> Result<()> {
        debug!("Deleting s3://{}/{}", self.bucket, key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| PgShiftError::storage(format!("{}", DisplayErrorContext(&e))))?;

        Ok(())
    }
}
