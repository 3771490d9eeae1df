//! PutObject transport
//!
//! Uploads file bytes to a presigned URL with a single HTTP PUT.
//!
//! # Example
//!
//! ```no_run
//! use hayate_uploadr::upload::put_object::HttpTransport;
//! use hayate_uploadr::upload::{PutRequest, Transport};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new()?;
//! let outcome = transport
//!     .put(PutRequest {
//!         url: "http://localhost:4566/test-uploads/hello.txt?X-Amz-Signature=...",
//!         body: Bytes::from("Hello, World!"),
//!         content_type: "text/plain",
//!         digest_header: ("Content-MD5", "ZajifYh5KDgxtmS9i38K1A=="),
//!     })
//!     .await?;
//! println!("Uploaded with status {}", outcome.status);
//! # Ok(())
//! # }
//! ```

use super::{PutOutcome, PutRequest, Transport, TransportError};
use crate::metrics;
use async_trait::async_trait;
use std::time::Instant;

/// HTTP PUT transport backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a default reqwest client
    pub fn new() -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::RequestError(e.to_string()))?;

        Ok(Self { http_client })
    }

    /// Create a transport around an existing client
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(
        name = "upload.put_object",
        skip(self, request),
        fields(
            http.method = "PUT",
            http.content_type = %request.content_type,
            upload.bytes = request.body.len(),
            http.status_code = tracing::field::Empty,
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn put(&self, request: PutRequest<'_>) -> Result<PutOutcome, TransportError> {
        let bytes = request.body.len() as u64;
        let start_time = Instant::now();
        let (digest_name, digest_value) = request.digest_header;

        let response = self
            .http_client
            .put(request.url)
            .header(reqwest::header::CONTENT_TYPE, request.content_type)
            .header(digest_name, digest_value)
            .body(request.body)
            .send()
            .await
            .map_err(|e| TransportError::RequestError(e.to_string()))?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let span = tracing::Span::current();
        span.record("http.status_code", status.as_u16());
        if let Some(etag) = &etag {
            span.record("s3.etag", etag.as_str());
        }

        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                duration_ms = start_time.elapsed().as_millis(),
                "PUT rejected by storage backend"
            );
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                status_text,
            });
        }

        metrics::record_upload_bytes(bytes);
        tracing::debug!(
            status = status.as_u16(),
            bytes_written = bytes,
            duration_ms = start_time.elapsed().as_millis(),
            "PUT completed"
        );

        Ok(PutOutcome::ok(status.as_u16(), status_text, etag))
    }
}
