//! Progress tracking
//!
//! [`ProgressTracker`] owns the per-file progress records and the batch
//! counters for one run. The two are guarded by independent locks: record
//! updates happen at every phase transition, counter updates once per file,
//! and neither lock is ever held across an await point or while the other is
//! held.
//!
//! # Example
//!
//! ```
//! use hayate_uploadr::progress::{Phase, ProgressTracker};
//!
//! let tracker = ProgressTracker::new();
//! tracker.initialize(["a.txt", "b.bin"]);
//!
//! tracker.update_phase(0, Phase::Hashing, 25).unwrap();
//! tracker.record_outcome(0, true).unwrap();
//! tracker.update_phase(0, Phase::Completed, 100).unwrap();
//!
//! assert_eq!(tracker.counters().completed, 1);
//! assert_eq!(tracker.snapshot()[1].phase, Phase::Waiting);
//! ```

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::watch;

/// Progress errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProgressError {
    #[error("Unknown file index {index} (run has {len} files)")]
    UnknownIndex { index: usize, len: usize },

    #[error("File {index} cannot move from {from} back to {to}")]
    PhaseRegression { index: usize, from: Phase, to: Phase },

    #[error("File {index} already reached terminal phase {phase}")]
    TerminalRewrite { index: usize, phase: Phase },

    #[error("File {index} progress cannot drop from {from}% to {to}%")]
    PercentRegression { index: usize, from: u8, to: u8 },

    #[error("Progress percent {0} is outside 0..=100")]
    PercentOutOfRange(u8),

    #[error("Outcome for file {index} was already recorded")]
    AlreadySettled { index: usize },
}

/// Pipeline phase of a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Waiting,
    Hashing,
    UrlFetch,
    Uploading,
    Completed,
    Failed,
}

impl Phase {
    /// Position in the forward-only phase order. Both terminal phases share the top rank.
    pub fn rank(self) -> u8 {
        match self {
            Phase::Waiting => 0,
            Phase::Hashing => 1,
            Phase::UrlFetch => 2,
            Phase::Uploading => 3,
            Phase::Completed | Phase::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Hashing => "hashing",
            Phase::UrlFetch => "urlFetch",
            Phase::Uploading => "uploading",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External view of one file's progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub id: usize,
    pub file_name: String,
    pub phase: Phase,
    pub progress_percent: u8,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Aggregate outcome counters for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounters {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl BatchCounters {
    /// Files that reached either terminal outcome
    pub fn settled(&self) -> usize {
        self.completed + self.failed
    }
}

#[derive(Debug, Default)]
struct CounterState {
    counters: BatchCounters,
    settled: Vec<bool>,
}

/// Shared progress state for one run
pub struct ProgressTracker {
    records: RwLock<Vec<ProgressRecord>>,
    counters: Mutex<CounterState>,
    /// Bumped under the records write lock on every mutation
    version: AtomicU64,
    /// Version of the snapshot last sent to subscribers
    published: Mutex<u64>,
    updates: watch::Sender<Vec<ProgressRecord>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("records", &self.records.read().len())
            .field("counters", &self.counters.lock().counters)
            .finish()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            records: RwLock::new(Vec::new()),
            counters: Mutex::new(CounterState::default()),
            version: AtomicU64::new(0),
            published: Mutex::new(0),
            updates,
        }
    }

    /// Reset state and create one `waiting` record per file, in submission order
    pub fn initialize<I, S>(&self, file_names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        let fresh: Vec<ProgressRecord> = file_names
            .into_iter()
            .enumerate()
            .map(|(id, name)| ProgressRecord {
                id,
                file_name: name.into(),
                phase: Phase::Waiting,
                progress_percent: 0,
                started_at: now,
                finished_at: None,
            })
            .collect();
        let total = fresh.len();

        let (version, snapshot) = {
            let mut records = self.records.write();
            *records = fresh;
            (self.bump_version(), records.clone())
        };
        self.publish(version, snapshot);

        let mut state = self.counters.lock();
        state.counters = BatchCounters {
            total,
            completed: 0,
            failed: 0,
        };
        state.settled = vec![false; total];
    }

    /// Overwrite the phase and percent of one record
    ///
    /// Phases only move forward and terminal phases are written once. Any
    /// non-terminal phase may jump straight to `failed`, which resets the
    /// percent to whatever the caller passes.
    pub fn update_phase(
        &self,
        index: usize,
        phase: Phase,
        progress_percent: u8,
    ) -> Result<(), ProgressError> {
        if progress_percent > 100 {
            return Err(ProgressError::PercentOutOfRange(progress_percent));
        }

        let mut records = self.records.write();
        let len = records.len();
        let record = records
            .get_mut(index)
            .ok_or(ProgressError::UnknownIndex { index, len })?;

        if record.phase.is_terminal() {
            return Err(ProgressError::TerminalRewrite {
                index,
                phase: record.phase,
            });
        }
        if phase.rank() < record.phase.rank() {
            return Err(ProgressError::PhaseRegression {
                index,
                from: record.phase,
                to: phase,
            });
        }
        if phase != Phase::Failed && progress_percent < record.progress_percent {
            return Err(ProgressError::PercentRegression {
                index,
                from: record.progress_percent,
                to: progress_percent,
            });
        }

        record.phase = phase;
        record.progress_percent = progress_percent;
        if phase.is_terminal() {
            record.finished_at = Some(Utc::now());
        }

        let version = self.bump_version();
        let snapshot = records.clone();
        drop(records);

        self.publish(version, snapshot);
        Ok(())
    }

    /// Count one file's terminal outcome
    ///
    /// Each index may be settled once per run. A second call is a caller bug:
    /// it panics in debug builds and is refused without counting in release.
    pub fn record_outcome(&self, index: usize, success: bool) -> Result<(), ProgressError> {
        let mut state = self.counters.lock();
        let len = state.settled.len();
        let settled = state
            .settled
            .get_mut(index)
            .ok_or(ProgressError::UnknownIndex { index, len })?;

        debug_assert!(!*settled, "outcome for file {index} recorded twice");
        if *settled {
            return Err(ProgressError::AlreadySettled { index });
        }
        *settled = true;

        if success {
            state.counters.completed += 1;
            tracing::debug!(
                file.index = index,
                completed = state.counters.completed,
                "Incremented completed count"
            );
        } else {
            state.counters.failed += 1;
            tracing::debug!(
                file.index = index,
                failed = state.counters.failed,
                "Incremented failed count"
            );
        }

        Ok(())
    }

    /// Current records, each one fully formed
    pub fn snapshot(&self) -> Vec<ProgressRecord> {
        self.records.read().clone()
    }

    /// Current record for one file
    pub fn record(&self, index: usize) -> Option<ProgressRecord> {
        self.records.read().get(index).cloned()
    }

    pub fn counters(&self) -> BatchCounters {
        self.counters.lock().counters
    }

    /// True once every file of a non-empty run has been settled
    pub fn is_finished(&self) -> bool {
        let counters = self.counters();
        counters.total > 0 && counters.settled() == counters.total
    }

    /// Watch channel that receives a fresh snapshot after every record change
    pub fn subscribe(&self) -> watch::Receiver<Vec<ProgressRecord>> {
        self.updates.subscribe()
    }

    /// Clear all records and counters
    pub fn reset(&self) {
        let version = {
            let mut records = self.records.write();
            records.clear();
            self.bump_version()
        };
        self.publish(version, Vec::new());

        let mut state = self.counters.lock();
        *state = CounterState::default();
    }

    /// Must be called with the records write lock held
    fn bump_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Send a snapshot taken at `version` unless a newer one already went out.
    /// Runs after the records lock is released: a subscriber holding a borrow
    /// delays only publication, never record reads or updates.
    fn publish(&self, version: u64, snapshot: Vec<ProgressRecord>) {
        let mut published = self.published.lock();
        if version > *published {
            *published = version;
            self.updates.send_replace(snapshot);
        }
    }
}
