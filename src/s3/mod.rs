//! S3 signed URL module
//!
//! Provisions the destination bucket and issues presigned PUT URLs.
//!
//! # Example
//!
//! ```no_run
//! use hayate_uploadr::config::StorageConfig;
//! use hayate_uploadr::s3::{S3SignedUrlProvider, SignedUrlProvider};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = S3SignedUrlProvider::new(&StorageConfig::default(), Duration::from_secs(3600)).await?;
//!
//! provider.ensure_destination_ready().await?;
//! let signed = provider.sign_url("hello.txt").await?;
//! println!("PUT to {} before {}", signed.url, signed.expires_at);
//! # Ok(())
//! # }
//! ```
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | HeadBucket / CreateBucket | `s3.ensure_bucket` | bucket, created |
//! | Presign PutObject | `s3.sign_url` | bucket, key, expiry_seconds |

pub mod credentials;

use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;

pub use credentials::CredentialsError;

/// Destination provisioning errors
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Bucket '{bucket}' could not be created: {reason}")]
    CreateRejected { bucket: String, reason: String },
}

/// URL signing errors
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("Invalid presigning configuration: {0}")]
    InvalidConfig(String),

    #[error("Presigning rejected for '{key}': {reason}")]
    Rejected { key: String, reason: String },
}

/// S3 client construction errors
#[derive(Error, Debug)]
pub enum S3ClientError {
    #[error("Credentials error: {0}")]
    CredentialsError(#[from] CredentialsError),
}

/// Time-limited upload destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Signed URL provider trait
///
/// `ensure_destination_ready` is idempotent and may be called redundantly
/// from concurrent pipelines; a destination that already exists is success.
#[async_trait]
pub trait SignedUrlProvider: Send + Sync {
    /// Provision the destination container if it does not exist yet
    async fn ensure_destination_ready(&self) -> Result<(), ProvisionError>;

    /// Issue a presigned PUT URL for `file_name`
    async fn sign_url(&self, file_name: &str) -> Result<SignedUrl, SigningError>;
}

/// S3-backed signed URL provider
pub struct S3SignedUrlProvider {
    client: Client,
    bucket: String,
    expiry: Duration,
    ready: OnceCell<()>,
}

impl S3SignedUrlProvider {
    /// Build a provider from storage configuration
    ///
    /// Static credentials from the config or environment are used when present,
    /// otherwise the AWS default provider chain is loaded.
    pub async fn new(config: &StorageConfig, expiry: Duration) -> Result<Self, S3ClientError> {
        let region = Region::new(config.region.clone());

        let mut builder = match credentials::resolve(config)? {
            Some(resolved) => {
                tracing::debug!(source = ?resolved.source, "Using static storage credentials");
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(resolved.credentials)
            }
            None => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        builder = builder.force_path_style(config.force_path_style);

        Ok(Self::with_client(
            Client::from_conf(builder.build()),
            config.bucket.clone(),
            expiry,
        ))
    }

    /// Wrap an existing SDK client
    pub fn with_client(client: Client, bucket: impl Into<String>, expiry: Duration) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            expiry,
            ready: OnceCell::new(),
        }
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get the URL validity window
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    async fn head_or_create_bucket(&self) -> Result<(), ProvisionError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                tracing::debug!(bucket = %self.bucket, "Bucket already present");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(
                    bucket = %self.bucket,
                    error = %e,
                    "HeadBucket failed, attempting CreateBucket"
                );
            }
        }

        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                tracing::Span::current().record("created", true);
                tracing::info!(bucket = %self.bucket, "Created bucket");
                Ok(())
            }
            Err(e) => {
                let already_there = e.as_service_error().is_some_and(|se| {
                    se.is_bucket_already_owned_by_you() || se.is_bucket_already_exists()
                });
                if already_there {
                    tracing::debug!(bucket = %self.bucket, "Bucket created concurrently");
                    return Ok(());
                }

                Err(ProvisionError::CreateRejected {
                    bucket: self.bucket.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl SignedUrlProvider for S3SignedUrlProvider {
    #[tracing::instrument(
        name = "s3.ensure_bucket",
        skip(self),
        fields(s3.bucket = %self.bucket, created = tracing::field::Empty),
        err
    )]
    async fn ensure_destination_ready(&self) -> Result<(), ProvisionError> {
        // A failed attempt leaves the cell empty so the next caller retries the check.
        self.ready
            .get_or_try_init(|| self.head_or_create_bucket())
            .await
            .map(|_| ())
    }

    #[tracing::instrument(
        name = "s3.sign_url",
        skip(self),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %file_name,
            expiry_seconds = self.expiry.as_secs()
        ),
        err
    )]
    async fn sign_url(&self, file_name: &str) -> Result<SignedUrl, SigningError> {
        let presigning = PresigningConfig::expires_in(self.expiry)
            .map_err(|e| SigningError::InvalidConfig(e.to_string()))?;

        let issued_at = Utc::now();
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(file_name)
            .presigned(presigning)
            .await
            .map_err(|e| SigningError::Rejected {
                key: file_name.to_string(),
                reason: e.to_string(),
            })?;

        let validity = chrono::Duration::from_std(self.expiry)
            .map_err(|e| SigningError::InvalidConfig(e.to_string()))?;

        Ok(SignedUrl {
            url: presigned.uri().to_string(),
            expires_at: issued_at + validity,
        })
    }
}
