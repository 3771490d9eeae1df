//! Scheduling policies for the file pipeline

use super::pipeline::{Pipeline, Stage};
use super::{FileTask, Strategy};
use futures::future::join_all;

/// Drive all tasks to a terminal outcome under `strategy`
pub(crate) async fn drive(strategy: Strategy, pipeline: &Pipeline<'_>, tasks: &mut [FileTask]) {
    match strategy {
        Strategy::Sequential => sequential(pipeline, tasks).await,
        Strategy::Batch => batch(pipeline, tasks).await,
        Strategy::Streaming => streaming(pipeline, tasks).await,
    }
}

/// One file at a time; a file's upload finishes before the next file hashes.
async fn sequential(pipeline: &Pipeline<'_>, tasks: &mut [FileTask]) {
    for task in tasks.iter_mut() {
        pipeline.run_to_end(task).await;
    }
}

/// Lockstep: every file finishes a stage before any file starts the next one.
async fn batch(pipeline: &Pipeline<'_>, tasks: &mut [FileTask]) {
    for stage in Stage::ALL {
        let active = tasks.iter().filter(|task| !task.is_settled()).count();
        if active == 0 {
            break;
        }

        join_all(
            tasks
                .iter_mut()
                .map(|task| pipeline.advance(task, stage)),
        )
        .await;

        tracing::debug!(
            upload.phase = %stage.phase(),
            active,
            "Phase barrier reached"
        );
    }
}

/// Fully concurrent: each file runs its own pipeline with no cross-file order.
async fn streaming(pipeline: &Pipeline<'_>, tasks: &mut [FileTask]) {
    join_all(tasks.iter_mut().map(|task| pipeline.run_to_end(task))).await;
}
