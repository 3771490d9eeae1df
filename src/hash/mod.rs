//! Content hashing
//!
//! Computes the integrity digest sent alongside each upload.
//!
//! [`Md5Hasher`] is the default: its `Content-MD5` header is a standard
//! header, so S3 accepts it on a presigned PUT that signs only `host`.
//! [`Sha256Hasher`] sends `x-amz-checksum-sha256`, which S3 only accepts when
//! the header is part of the signature.

use crate::upload::UploadFile;
use async_trait::async_trait;
use base64::Engine as _;
use md5::Md5;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Hash errors
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to read '{file}': {source}")]
    Unreadable {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

/// Digest algorithm and the request header it travels in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Md5,
}

impl DigestAlgorithm {
    pub fn header_name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "x-amz-checksum-sha256",
            DigestAlgorithm::Md5 => "Content-MD5",
        }
    }
}

/// Base64-encoded content digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    algorithm: DigestAlgorithm,
    raw: Vec<u8>,
    encoded: String,
}

impl ContentDigest {
    pub fn new(algorithm: DigestAlgorithm, raw: Vec<u8>) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&raw);
        Self {
            algorithm,
            raw,
            encoded,
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn header_name(&self) -> &'static str {
        self.algorithm.header_name()
    }

    /// Base64 header value
    pub fn value(&self) -> &str {
        &self.encoded
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

/// Content hash provider
///
/// Implementations hold no mutable state between calls and may be invoked
/// concurrently from every file's pipeline.
#[async_trait]
pub trait HashProvider: Send + Sync {
    async fn digest(&self, file: &UploadFile) -> Result<ContentDigest, HashError>;
}

async fn read_for_digest(file: &UploadFile) -> Result<bytes::Bytes, HashError> {
    file.read().await.map_err(|source| HashError::Unreadable {
        file: file.name().to_string(),
        source,
    })
}

/// MD5 hash provider, sent as `Content-MD5`
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Hasher;

#[async_trait]
impl HashProvider for Md5Hasher {
    #[tracing::instrument(
        name = "hash.md5",
        skip(self, file),
        fields(file.name = %file.name()),
        err
    )]
    async fn digest(&self, file: &UploadFile) -> Result<ContentDigest, HashError> {
        let body = read_for_digest(file).await?;
        let raw = Md5::digest(&body).to_vec();
        Ok(ContentDigest::new(DigestAlgorithm::Md5, raw))
    }
}

/// SHA-256 hash provider
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

#[async_trait]
impl HashProvider for Sha256Hasher {
    #[tracing::instrument(
        name = "hash.sha256",
        skip(self, file),
        fields(file.name = %file.name()),
        err
    )]
    async fn digest(&self, file: &UploadFile) -> Result<ContentDigest, HashError> {
        let body = read_for_digest(file).await?;
        let raw = Sha256::digest(&body).to_vec();
        Ok(ContentDigest::new(DigestAlgorithm::Sha256, raw))
    }
}
