//! Hayate Uploadr Library
//!
//! Concurrent batch uploader for S3-compatible object storage.
//!
//! # Features
//!
//! - **Three-phase pipeline**: content hash → presigned URL → PUT, per file
//! - **Three strategies**: sequential, barrier-synchronized batch, and streaming
//! - **Live progress**: per-file phase records and outcome counters, pollable or watchable
//! - **Failure isolation**: one file failing never cancels its siblings
//!
//! # Example
//!
//! ```no_run
//! use hayate_uploadr::{config::Config, hash::Md5Hasher, orchestrator::Orchestrator};
//! use hayate_uploadr::s3::S3SignedUrlProvider;
//! use hayate_uploadr::upload::{put_object::HttpTransport, UploadFile};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let signer = S3SignedUrlProvider::new(&config.storage, config.signing.expiry()).await?;
//!     let mut orchestrator = Orchestrator::new(
//!         Arc::new(Md5Hasher),
//!         Arc::new(signer),
//!         Arc::new(HttpTransport::new()?),
//!     );
//!
//!     let files = vec![UploadFile::from_path("report.pdf", &config.upload.default_content_type)?];
//!     if let Some(result) = orchestrator.run(config.upload.strategy, files).await {
//!         println!("{:.2} ms", result.elapsed_ms());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod hash;
pub mod metrics;
pub mod orchestrator;
pub mod progress;
pub mod s3;
pub mod telemetry;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use orchestrator::{Orchestrator, RunResult, Strategy};
pub use progress::{Phase, ProgressTracker};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
