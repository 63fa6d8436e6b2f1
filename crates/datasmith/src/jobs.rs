//! Background generation jobs: one supervised worker thread at a time.
//!
//! The worker opens its own connection from the session credentials so a
//! long-running generation cannot wedge the dispatch connection. Results
//! come back over an mpsc channel; progress is shared through a
//! mutex-guarded snapshot; a per-row cancellation flag implements
//! `clear_gen_packets`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::thread::JoinHandle;

use tracing::{debug, warn};
use uuid::Uuid;

use datasmith_core::creds::DbCreds;
use datasmith_core::packet::TablePacket;
use datasmith_core::spec::TableSpec;
use datasmith_gen::progress::{self, JobStatus, Progress, SharedProgress, report};
use datasmith_gen::{GenError, build_packets};
use datasmith_db::SqlLog;

type JobOutcome = Result<(TableSpec, TablePacket), String>;

struct Job {
    id: String,
    rx: Receiver<JobOutcome>,
    progress: SharedProgress,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// What a poll observed.
pub enum JobPoll {
    Running(Progress),
    Finished(JobOutcome),
}

/// Owner of the single allowed generation job.
#[derive(Default)]
pub struct JobManager {
    active: Option<Job>,
}

impl JobManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a generation worker. Re-entry while a job is active is an
    /// error.
    pub fn start(
        &mut self,
        creds: DbCreds,
        spec: TableSpec,
        sql_log: Option<SqlLog>,
    ) -> Result<String, String> {
        if self.active.is_some() {
            return Err("A generation job is already running.".to_string());
        }

        let id = Uuid::new_v4().to_string();
        let (tx, rx) = channel();
        let progress = progress::shared();
        let cancel = Arc::new(AtomicBool::new(false));

        let worker_progress = Arc::clone(&progress);
        let worker_cancel = Arc::clone(&cancel);
        let table = spec.name.clone();
        let handle = std::thread::spawn(move || {
            let outcome = (|| -> Result<(TableSpec, TablePacket), GenError> {
                let mut driver = datasmith_db::connect(&creds, sql_log)?;
                build_packets(driver.as_mut(), &spec, &worker_progress, &worker_cancel)
            })();

            if let Err(e) = &outcome {
                if !matches!(e, GenError::Cancelled) {
                    warn!(table = %table, "generation job failed: {e}");
                    report(&worker_progress, JobStatus::Error, 0, 0, "");
                }
            }
            let _ = tx.send(outcome.map_err(|e| e.to_string()));
        });

        debug!(job = %id, "generation job started");
        self.active = Some(Job {
            id: id.clone(),
            rx,
            progress,
            cancel,
            handle: Some(handle),
        });
        Ok(id)
    }

    /// Checks on the active job; a finished job is consumed by the call.
    pub fn poll(&mut self) -> Option<JobPoll> {
        let job = self.active.as_mut()?;
        match job.rx.try_recv() {
            Ok(outcome) => {
                if let Some(mut job) = self.active.take() {
                    if let Some(handle) = job.handle.take() {
                        let _ = handle.join();
                    }
                }
                Some(JobPoll::Finished(outcome))
            }
            Err(TryRecvError::Empty) => {
                Some(JobPoll::Running(progress::snapshot(&job.progress)))
            }
            Err(TryRecvError::Disconnected) => {
                self.active = None;
                Some(JobPoll::Finished(Err(
                    "generation worker terminated unexpectedly".to_string(),
                )))
            }
        }
    }

    /// Cancels and discards the active job, if any. The worker notices the
    /// flag at its next row boundary; the thread is detached rather than
    /// joined so cancellation returns immediately.
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(job) => {
                job.cancel.store(true, Ordering::Relaxed);
                debug!(job = %job.id, "generation job cancelled");
                true
            }
            None => false,
        }
    }
}
