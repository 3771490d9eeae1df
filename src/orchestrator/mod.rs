//! Upload orchestration
//!
//! Drives every submitted file through hash → signed URL → PUT. The stages
//! are defined once in the `pipeline` submodule; [`Strategy`] only decides how the stages
//! of different files are scheduled against each other:
//!
//! | Strategy | Scheduling |
//! |----------|------------|
//! | `sequential` | one file at a time, all three stages before the next file starts |
//! | `batch` | each stage runs for all files concurrently, with a barrier between stages |
//! | `streaming` | every file runs its own pipeline concurrently, no barriers |
//!
//! A failing file is settled as failed and stops; it never aborts its
//! siblings or the run.
//!
//! # Example
//!
//! ```no_run
//! use hayate_uploadr::hash::Md5Hasher;
//! use hayate_uploadr::orchestrator::{Orchestrator, Strategy};
//! use hayate_uploadr::s3::S3SignedUrlProvider;
//! use hayate_uploadr::upload::put_object::HttpTransport;
//! use hayate_uploadr::upload::UploadFile;
//! use hayate_uploadr::config::StorageConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let signer = S3SignedUrlProvider::new(&StorageConfig::default(), Duration::from_secs(3600)).await?;
//! let mut orchestrator = Orchestrator::new(
//!     Arc::new(Md5Hasher),
//!     Arc::new(signer),
//!     Arc::new(HttpTransport::new()?),
//! );
//!
//! let files = vec![UploadFile::from_bytes("a.txt", "text/plain", "alpha")];
//! if let Some(result) = orchestrator.run(Strategy::Streaming, files).await {
//!     println!("{} ok in {:.2} ms", result.completed_count(), result.elapsed_ms());
//! }
//! # Ok(())
//! # }
//! ```

mod pipeline;
mod schedule;

use crate::hash::{ContentDigest, HashError, HashProvider};
use crate::metrics;
use crate::progress::{Phase, ProgressTracker};
use crate::s3::{ProvisionError, SignedUrl, SignedUrlProvider, SigningError};
use crate::upload::{PutOutcome, Transport, TransportError, UploadFile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use pipeline::Pipeline;

/// Per-file pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Hashing failed: {0}")]
    Hash(#[from] HashError),

    #[error("Destination not ready: {0}")]
    Provision(#[from] ProvisionError),

    #[error("URL signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("Upload failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Pipeline stopped before the {0} phase completed")]
    Incomplete(Phase),
}

impl PipelineError {
    /// Phase the file was in when it failed
    pub fn phase(&self) -> Phase {
        match self {
            PipelineError::Hash(_) => Phase::Hashing,
            PipelineError::Provision(_) | PipelineError::Signing(_) => Phase::UrlFetch,
            PipelineError::Transport(_) => Phase::Uploading,
            PipelineError::Incomplete(phase) => *phase,
        }
    }
}

/// Concurrency strategy for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Sequential,
    Batch,
    #[default]
    Streaming,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Sequential, Strategy::Batch, Strategy::Streaming];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::Batch => "batch",
            Strategy::Streaming => "streaming",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Strategy::Sequential),
            "batch" => Ok(Strategy::Batch),
            "streaming" => Ok(Strategy::Streaming),
            other => Err(format!(
                "unknown strategy '{other}': expected sequential, batch or streaming"
            )),
        }
    }
}

/// One file's journey through the pipeline
///
/// Owned exclusively by that file's pipeline; fields fill in once per phase.
#[derive(Debug)]
pub struct FileTask {
    pub index: usize,
    pub file: UploadFile,
    pub digest: Option<ContentDigest>,
    pub destination: Option<SignedUrl>,
    pub result: Option<Result<PutOutcome, PipelineError>>,
}

impl FileTask {
    pub fn new(index: usize, file: UploadFile) -> Self {
        Self {
            index,
            file,
            digest: None,
            destination: None,
            result: None,
        }
    }

    /// True once the file reached a terminal outcome
    pub fn is_settled(&self) -> bool {
        self.result.is_some()
    }

    fn into_outcome(self) -> FileOutcome {
        FileOutcome {
            index: self.index,
            file_name: self.file.name().to_string(),
            result: self
                .result
                .unwrap_or_else(|| Err(PipelineError::Incomplete(Phase::Uploading))),
        }
    }
}

/// Final outcome for one submitted file
#[derive(Debug)]
pub struct FileOutcome {
    pub index: usize,
    pub file_name: String,
    pub result: Result<PutOutcome, PipelineError>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Transport status text, or the error detail for a failed file
    pub fn status_text(&self) -> String {
        match &self.result {
            Ok(outcome) => outcome.status_text.clone(),
            Err(e) => e.to_string(),
        }
    }

    pub fn failed_phase(&self) -> Option<Phase> {
        self.result.as_ref().err().map(PipelineError::phase)
    }
}

/// Result of one orchestration run
#[derive(Debug)]
pub struct RunResult {
    pub run_id: Uuid,
    pub strategy: Strategy,
    /// Aligned by index with the submitted files
    pub outcomes: Vec<FileOutcome>,
    pub elapsed: Duration,
}

impl RunResult {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    pub fn completed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.completed_count()
    }
}

/// Upload orchestrator
///
/// Owns the collaborators and the [`ProgressTracker`] shared with observers.
/// `run` takes `&mut self`, so one orchestrator never runs two batches at once.
pub struct Orchestrator {
    hasher: Arc<dyn HashProvider>,
    signer: Arc<dyn SignedUrlProvider>,
    transport: Arc<dyn Transport>,
    tracker: Arc<ProgressTracker>,
}

impl Orchestrator {
    pub fn new(
        hasher: Arc<dyn HashProvider>,
        signer: Arc<dyn SignedUrlProvider>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            hasher,
            signer,
            transport,
            tracker: Arc::new(ProgressTracker::new()),
        }
    }

    /// Shared progress state, pollable while a run is in flight
    pub fn tracker(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.tracker)
    }

    /// Upload `files` using `strategy`
    ///
    /// Returns `None` without touching progress state when `files` is empty.
    pub async fn run(&mut self, strategy: Strategy, files: Vec<UploadFile>) -> Option<RunResult> {
        if files.is_empty() {
            tracing::info!(strategy = %strategy, "No files submitted, nothing to upload");
            return None;
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "orchestrator.run",
            run.id = %run_id,
            strategy = %strategy,
            files = files.len()
        );

        Some(
            self.run_batch(run_id, strategy, files)
                .instrument(span)
                .await,
        )
    }

    async fn run_batch(&self, run_id: Uuid, strategy: Strategy, files: Vec<UploadFile>) -> RunResult {
        self.tracker
            .initialize(files.iter().map(|file| file.name().to_string()));

        let mut tasks: Vec<FileTask> = files
            .into_iter()
            .enumerate()
            .map(|(index, file)| FileTask::new(index, file))
            .collect();

        let pipeline = Pipeline::new(
            self.hasher.as_ref(),
            self.signer.as_ref(),
            self.transport.as_ref(),
            &self.tracker,
            strategy,
        );

        let start = Instant::now();
        schedule::drive(strategy, &pipeline, &mut tasks).await;
        let elapsed = start.elapsed();

        let outcomes: Vec<FileOutcome> = tasks.into_iter().map(FileTask::into_outcome).collect();
        let counters = self.tracker.counters();
        metrics::record_run(strategy.as_str(), elapsed.as_secs_f64());

        tracing::info!(
            completed = counters.completed,
            failed = counters.failed,
            elapsed_ms = format!("{:.2}", elapsed.as_secs_f64() * 1000.0),
            "Upload run finished"
        );

        RunResult {
            run_id,
            strategy,
            outcomes,
            elapsed,
        }
    }

    /// Clear progress records and counters left by the previous run
    pub fn reset_uploads(&mut self) {
        self.tracker.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse_and_display() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.to_string().parse::<Strategy>(), Ok(strategy));
        }
        assert_eq!("BATCH".parse::<Strategy>(), Ok(Strategy::Batch));
        assert!("parallel".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_pipeline_error_phase() {
        let err = PipelineError::from(TransportError::Rejected {
            status: 403,
            status_text: "Forbidden".into(),
        });
        assert_eq!(err.phase(), Phase::Uploading);
        assert_eq!(err.to_string(), "Upload failed: Upload rejected: 403 Forbidden");

        let err = PipelineError::from(SigningError::InvalidConfig("bad".into()));
        assert_eq!(err.phase(), Phase::UrlFetch);
    }

    #[test]
    fn test_unsettled_task_becomes_incomplete_failure() {
        let task = FileTask::new(0, UploadFile::from_bytes("a", "text/plain", "x"));
        let outcome = task.into_outcome();
        assert!(!outcome.is_success());
        assert_eq!(outcome.failed_phase(), Some(Phase::Uploading));
    }
}
