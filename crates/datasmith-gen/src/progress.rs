//! Shared progress snapshot for background generation jobs.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Running,
    Done,
    Error,
}

/// Progress fields shared between the job worker and the poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub status: JobStatus,
    pub row: usize,
    pub total: usize,
    pub column: String,
}

impl Progress {
    pub fn idle() -> Self {
        Self {
            status: JobStatus::Idle,
            row: 0,
            total: 0,
            column: String::new(),
        }
    }
}

/// Mutex-guarded progress handle shared with the worker.
pub type SharedProgress = Arc<Mutex<Progress>>;

/// Fresh idle progress handle.
pub fn shared() -> SharedProgress {
    Arc::new(Mutex::new(Progress::idle()))
}

/// Overwrites the shared snapshot; a poisoned mutex is ignored since
/// progress is advisory.
pub fn report(progress: &SharedProgress, status: JobStatus, row: usize, total: usize, column: &str) {
    if let Ok(mut guard) = progress.lock() {
        *guard = Progress {
            status,
            row,
            total,
            column: column.to_string(),
        };
    }
}

/// Reads the current snapshot.
pub fn snapshot(progress: &SharedProgress) -> Progress {
    progress
        .lock()
        .map(|guard| guard.clone())
        .unwrap_or_else(|_| Progress::idle())
}
