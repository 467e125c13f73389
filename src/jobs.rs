/*!
 * Run registry.
 *
 * Each submitted run gets a `RunHandle` whose state the web front end
 * reads instead of polling the file system. A semaphore bounds how many
 * runs execute at once; the rest wait as `Pending`. A run that panics is
 * recorded as failed at its join point. Finished runs are dropped from the
 * registry once their retention period has passed.
 */

use log::{debug, error, info};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::errors::PipelineError;
use crate::pipeline::RunStage;

/// Lifecycle of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running { stage: RunStage },
    Succeeded { output: PathBuf },
    Failed { reason: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// Coarse status reported to polling clients
    pub fn status_label(&self) -> &'static str {
        match self {
            Self::Pending | Self::Running { .. } => "processing",
            Self::Succeeded { .. } => "complete",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Shared view of one run's state
#[derive(Debug, Clone)]
pub struct RunHandle {
    id: String,
    state: Arc<RwLock<RunState>>,
    finished_at: Arc<RwLock<Option<Instant>>>,
}

impl RunHandle {
    fn new(id: String) -> Self {
        Self {
            id,
            state: Arc::new(RwLock::new(RunState::Pending)),
            finished_at: Arc::new(RwLock::new(None)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> RunState {
        self.state.read().clone()
    }

    pub fn set_stage(&self, stage: RunStage) {
        let mut state = self.state.write();
        if !state.is_terminal() {
            *state = RunState::Running { stage };
        }
    }

    fn finish(&self, outcome: RunState) {
        // Timestamp first so a terminal state always has one
        *self.finished_at.write() = Some(Instant::now());
        *self.state.write() = outcome;
    }

    fn expired(&self, retention: Duration) -> bool {
        self.finished_at.read().is_some_and(|at| at.elapsed() >= retention)
    }

    /// Poll until the run reaches a terminal state
    pub async fn wait(&self, poll_interval: Duration) -> RunState {
        loop {
            let state = self.state();
            if state.is_terminal() {
                return state;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// All runs known to this process, keyed by run id
#[derive(Debug)]
pub struct RunRegistry {
    runs: RwLock<HashMap<String, RunHandle>>,
    permits: Arc<Semaphore>,
    retention: Duration,
}

/// How long a finished run stays queryable unless configured otherwise
pub const DEFAULT_RUN_RETENTION: Duration = Duration::from_secs(3600);

impl RunRegistry {
    pub fn new(max_concurrent_runs: usize) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            retention: DEFAULT_RUN_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Drop finished runs older than the retention period; returns how many were removed
    pub fn prune(&self) -> usize {
        let mut runs = self.runs.write();
        let before = runs.len();
        runs.retain(|_, handle| !handle.expired(self.retention));
        let removed = before - runs.len();
        if removed > 0 {
            debug!("Forgot {} finished run(s)", removed);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<RunHandle> {
        self.runs.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }

    /// Start a run in the background and return its handle immediately.
    ///
    /// `job` receives the handle so it can report stages as it goes.
    pub fn submit<F, Fut>(&self, id: impl Into<String>, job: F) -> RunHandle
    where
        F: FnOnce(RunHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<PathBuf, PipelineError>> + Send + 'static,
    {
        self.prune();

        let handle = RunHandle::new(id.into());
        self.runs.write().insert(handle.id.clone(), handle.clone());

        let permits = Arc::clone(&self.permits);
        let tracked = handle.clone();

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracked.finish(RunState::Failed { reason: e.to_string() });
                    return;
                }
            };

            tracked.set_stage(RunStage::Uploaded);
            info!("Run {} started", tracked.id());

            // Inner task so a panic surfaces as a JoinError here
            let outcome = match tokio::spawn(job(tracked.clone())).await {
                Ok(Ok(output)) => {
                    info!("Run {} succeeded: {:?}", tracked.id(), output);
                    RunState::Succeeded { output }
                }
                Ok(Err(e)) => {
                    error!("Run {} failed: {}", tracked.id(), e);
                    RunState::Failed { reason: e.to_string() }
                }
                Err(e) => {
                    error!("Run {} aborted: {}", tracked.id(), e);
                    RunState::Failed {
                        reason: format!("Run aborted: {}", e),
                    }
                }
            };

            tracked.finish(outcome);
        });

        handle
    }
}
