//! Bounded, most-recent-first history of sync runs.
//!
//! One writer starts and finishes runs while any number of readers take
//! snapshots. Each run record is updated under its own lock so a reader
//! never sees a run half-finished.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stratus_core::CorrelationId;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Success,
    Failure,
}

impl RunStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::InProgress)
    }
}

/// Snapshot of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub correlation_id: CorrelationId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

type SharedRun = Arc<Mutex<SyncRun>>;

fn lock(run: &Mutex<SyncRun>) -> MutexGuard<'_, SyncRun> {
    run.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed-capacity run history.
#[derive(Debug, Clone)]
pub struct RunTracker {
    capacity: usize,
    runs: Arc<RwLock<VecDeque<SharedRun>>>,
}

impl RunTracker {
    /// Tracker keeping the `capacity` most recent runs (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            runs: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a new in-progress run, evicting the oldest beyond capacity.
    pub fn start_new_run(&self, correlation_id: CorrelationId) -> RunHandle {
        let run = Arc::new(Mutex::new(SyncRun {
            correlation_id,
            status: RunStatus::InProgress,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }));

        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        runs.push_front(Arc::clone(&run));
        runs.truncate(self.capacity);

        RunHandle { run }
    }

    /// Snapshot of the history, most recent first.
    #[must_use]
    pub fn get_runs(&self) -> Vec<SyncRun> {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        runs.iter().map(|run| lock(run).clone()).collect()
    }
}

/// Completion handle for one run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    run: SharedRun,
}

impl RunHandle {
    /// Mark the run successful.
    pub fn finish(&self) {
        self.complete(RunStatus::Success, None);
    }

    /// Mark the run failed with `err`.
    pub fn finish_with_error(&self, err: &dyn std::fmt::Display) {
        self.complete(RunStatus::Failure, Some(err.to_string()));
    }

    fn complete(&self, status: RunStatus, error: Option<String>) {
        let mut run = lock(&self.run);
        if run.status.is_terminal() {
            tracing::warn!(
                correlation_id = %run.correlation_id,
                status = ?run.status,
                "Run already finished, ignoring"
            );
            return;
        }
        run.status = status;
        run.finished_at = Some(Utc::now());
        run.error = error;
    }

    #[must_use]
    pub fn correlation_id(&self) -> CorrelationId {
        lock(&self.run).correlation_id
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        lock(&self.run).status
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        lock(&self.run).started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.run).finished_at
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        lock(&self.run).error.clone()
    }

    /// Current snapshot of the run.
    #[must_use]
    pub fn snapshot(&self) -> SyncRun {
        lock(&self.run).clone()
    }
}
