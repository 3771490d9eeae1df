//! The three-stage per-file pipeline
//!
//! Each stage announces its phase on the tracker, awaits exactly one
//! collaborator call, and either fills in the task or settles it as failed.
//! Tracker locks are taken and released between awaits, never across one.

use super::{FileTask, PipelineError, Strategy};
use crate::hash::HashProvider;
use crate::metrics;
use crate::progress::{Phase, ProgressTracker};
use crate::s3::SignedUrlProvider;
use crate::upload::{PutOutcome, PutRequest, Transport, TransportError};
use std::time::Instant;

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Hash,
    Sign,
    Upload,
}

impl Stage {
    pub(crate) const ALL: [Stage; 3] = [Stage::Hash, Stage::Sign, Stage::Upload];

    pub(crate) fn phase(self) -> Phase {
        match self {
            Stage::Hash => Phase::Hashing,
            Stage::Sign => Phase::UrlFetch,
            Stage::Upload => Phase::Uploading,
        }
    }

    fn percent(self) -> u8 {
        match self {
            Stage::Hash => 25,
            Stage::Sign => 50,
            Stage::Upload => 75,
        }
    }
}

pub(crate) struct Pipeline<'a> {
    hasher: &'a dyn HashProvider,
    signer: &'a dyn SignedUrlProvider,
    transport: &'a dyn Transport,
    tracker: &'a ProgressTracker,
    strategy: Strategy,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(
        hasher: &'a dyn HashProvider,
        signer: &'a dyn SignedUrlProvider,
        transport: &'a dyn Transport,
        tracker: &'a ProgressTracker,
        strategy: Strategy,
    ) -> Self {
        Self {
            hasher,
            signer,
            transport,
            tracker,
            strategy,
        }
    }

    /// Run every remaining stage of one file
    pub(crate) async fn run_to_end(&self, task: &mut FileTask) {
        tracing::debug!(
            file.index = task.index,
            file.name = %task.file.name(),
            "Starting file pipeline"
        );
        for stage in Stage::ALL {
            self.advance(task, stage).await;
        }
    }

    /// Run one stage of one file. Settled files are left untouched.
    pub(crate) async fn advance(&self, task: &mut FileTask, stage: Stage) {
        if task.is_settled() {
            return;
        }

        self.mark(task.index, stage.phase(), stage.percent());
        let started = Instant::now();

        let result = match stage {
            Stage::Hash => self.hash(task).await,
            Stage::Sign => self.sign(task).await,
            Stage::Upload => match self.upload(task).await {
                Ok(outcome) => {
                    self.settle(task, Ok(outcome));
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        metrics::record_phase_duration(stage.phase().as_str(), started.elapsed().as_secs_f64());

        if let Err(e) = result {
            self.settle(task, Err(e));
        }
    }

    async fn hash(&self, task: &mut FileTask) -> Result<(), PipelineError> {
        let digest = self.hasher.digest(&task.file).await?;
        tracing::debug!(
            file.index = task.index,
            digest = %digest.to_hex(),
            "Content digest computed"
        );
        task.digest = Some(digest);
        Ok(())
    }

    async fn sign(&self, task: &mut FileTask) -> Result<(), PipelineError> {
        self.signer.ensure_destination_ready().await?;
        let destination = self.signer.sign_url(task.file.name()).await?;
        tracing::debug!(
            file.index = task.index,
            expires_at = %destination.expires_at,
            "Signed upload URL acquired"
        );
        task.destination = Some(destination);
        Ok(())
    }

    async fn upload(&self, task: &FileTask) -> Result<PutOutcome, PipelineError> {
        let (Some(digest), Some(destination)) = (&task.digest, &task.destination) else {
            return Err(PipelineError::Incomplete(Phase::UrlFetch));
        };

        let body = task.file.read().await.map_err(TransportError::from)?;
        let outcome = self
            .transport
            .put(PutRequest {
                url: &destination.url,
                body,
                content_type: task.file.content_type(),
                digest_header: (digest.header_name(), digest.value()),
            })
            .await?;

        if !outcome.success {
            return Err(TransportError::Rejected {
                status: outcome.status,
                status_text: outcome.status_text,
            }
            .into());
        }

        Ok(outcome)
    }

    /// Record the terminal outcome: counter first, then the record's phase
    fn settle(&self, task: &mut FileTask, result: Result<PutOutcome, PipelineError>) {
        let success = result.is_ok();

        if let Err(e) = self.tracker.record_outcome(task.index, success) {
            tracing::warn!(file.index = task.index, error = %e, "Outcome not counted");
        }

        match &result {
            Ok(outcome) => {
                self.mark(task.index, Phase::Completed, 100);
                tracing::info!(
                    file.index = task.index,
                    file.name = %task.file.name(),
                    status = outcome.status,
                    "File uploaded"
                );
            }
            Err(e) => {
                self.mark(task.index, Phase::Failed, 0);
                tracing::error!(
                    file.index = task.index,
                    file.name = %task.file.name(),
                    upload.phase = %e.phase(),
                    error = %e,
                    "File upload failed"
                );
            }
        }

        metrics::record_file_outcome(self.strategy.as_str(), success);
        task.result = Some(result);
    }

    fn mark(&self, index: usize, phase: Phase, percent: u8) {
        if let Err(e) = self.tracker.update_phase(index, phase, percent) {
            tracing::warn!(file.index = index, error = %e, "Progress update rejected");
        }
    }
}
