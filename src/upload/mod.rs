//! Upload module
//!
//! File handles submitted for upload and the transport that PUTs their bytes
//! to a signed destination URL.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod put_object;

/// Fallback content type when none is supplied or inferred
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Upload rejected: {status} {status_text}")]
    Rejected { status: u16, status_text: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Where the bytes of an [`UploadFile`] live
#[derive(Debug, Clone)]
pub enum FileSource {
    Memory(Bytes),
    Path(PathBuf),
}

/// Opaque handle to one submitted file
///
/// The handle is never mutated once created. Path-backed files are read
/// lazily, so a file that disappears between selection and upload surfaces
/// as an I/O error in whichever phase reads it first.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    content_type: String,
    source: FileSource,
}

impl UploadFile {
    /// Create a file handle from in-memory bytes
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            source: FileSource::Memory(body.into()),
        }
    }

    /// Create a file handle backed by a path on disk
    ///
    /// The object name is the final path component. The content type is
    /// inferred from the file's magic bytes, falling back to `default_content_type`.
    pub fn from_path(path: impl AsRef<Path>, default_content_type: &str) -> std::io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} has no file name", path.display()),
                )
            })?;

        let content_type = infer::get_from_path(path)?
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| default_content_type.to_string());

        Ok(Self {
            name,
            content_type,
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Object name used as the destination key
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Read the full content of the file
    pub async fn read(&self) -> std::io::Result<Bytes> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }
}

/// A single PUT to a signed destination
#[derive(Debug, Clone)]
pub struct PutRequest<'a> {
    pub url: &'a str,
    pub body: Bytes,
    pub content_type: &'a str,
    /// Integrity header name and value derived from the content digest
    pub digest_header: (&'a str, &'a str),
}

/// Status metadata returned by a transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    pub success: bool,
    pub status: u16,
    pub status_text: String,
    pub etag: Option<String>,
}

impl PutOutcome {
    /// Outcome of a 2xx response
    pub fn ok(status: u16, status_text: impl Into<String>, etag: Option<String>) -> Self {
        Self {
            success: true,
            status,
            status_text: status_text.into(),
            etag,
        }
    }
}

/// Transport trait
///
/// Performs one upload attempt. Implementations never retry.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn put(&self, request: PutRequest<'_>) -> Result<PutOutcome, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_memory_file_read() {
        let file = UploadFile::from_bytes("a.txt", "text/plain", "hello");
        assert_eq!(file.name(), "a.txt");
        assert_eq!(file.content_type(), "text/plain");
        assert_eq!(file.read().await.unwrap(), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_path_file_uses_file_name_and_default_type() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"plain text body").unwrap();

        let file = UploadFile::from_path(tmp.path(), DEFAULT_CONTENT_TYPE).unwrap();
        assert_eq!(
            file.name(),
            tmp.path().file_name().unwrap().to_string_lossy()
        );
        assert_eq!(file.content_type(), DEFAULT_CONTENT_TYPE);
        assert_eq!(file.read().await.unwrap(), Bytes::from("plain text body"));
    }

    #[test]
    fn test_path_file_infers_png() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0])
            .unwrap();

        let file = UploadFile::from_path(tmp.path(), DEFAULT_CONTENT_TYPE).unwrap();
        assert_eq!(file.content_type(), "image/png");
    }

    #[tokio::test]
    async fn test_deleted_path_fails_on_read() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = UploadFile::from_path(tmp.path(), DEFAULT_CONTENT_TYPE).unwrap();
        drop(tmp);

        assert!(file.read().await.is_err());
    }
}
