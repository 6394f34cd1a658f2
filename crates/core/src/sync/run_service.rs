//! Run orchestration: lock, run log, background worker and status surface.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::cache::{CacheKeys, CacheStore};
use crate::constants::{FULL_RUN_LOCK_NAME, SYNC_STATUS_CACHE_TTL_SECS};
use crate::errors::{Error, Result};
use crate::runs::{RunCategory, RunCompletion, RunCounters, RunLog, RunStatus};

use super::{Pipeline, ProgressEntry, ProgressLog};

/// Answer to a run trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartRunOutcome {
    Accepted { run_id: i64 },
    /// Rejected because another holder owns the run lock.
    AlreadyRunning { holder: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    Idle,
    Running,
}

/// What a status poller sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusView {
    pub state: RunnerState,
    pub current_run: Option<RunLog>,
    pub entries: Vec<ProgressEntry>,
    pub counters: RunCounters,
    /// Most recent run that reached a terminal status.
    pub last_run: Option<RunLog>,
}

#[async_trait]
pub trait RunServiceTrait: Send + Sync {
    /// Queues a run for the background worker, or rejects it when a run is
    /// already in progress. Never waits for the run itself.
    async fn start_run(&self, category: RunCategory) -> Result<StartRunOutcome>;

    /// Executes a run on the caller's task and returns its error, if any.
    async fn run_blocking(&self, category: RunCategory) -> Result<RunLog>;

    fn get_run_status(&self) -> Result<RunStatusView>;
}

#[derive(Debug, Clone)]
struct RunJob {
    run_id: i64,
    category: RunCategory,
    holder: String,
}

enum Admission {
    Admitted(RunJob),
    Busy(Option<String>),
}

pub struct RunService {
    pipeline: Arc<Pipeline>,
    cache: Option<Arc<dyn CacheStore>>,
    progress: Arc<ProgressLog>,
    active: Mutex<Option<RunJob>>,
    jobs: mpsc::UnboundedSender<RunJob>,
    queue: tokio::sync::Mutex<mpsc::UnboundedReceiver<RunJob>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl RunService {
    pub fn new(pipeline: Arc<Pipeline>, progress: Arc<ProgressLog>) -> Self {
        let (jobs, queue) = mpsc::unbounded_channel();
        Self {
            pipeline,
            cache: None,
            progress,
            active: Mutex::new(None),
            jobs,
            queue: tokio::sync::Mutex::new(queue),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    /// Cache cleared after every successful run.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Starts the worker that executes queued runs. Idempotent while the
    /// worker is alive.
    pub async fn spawn_worker(self: &Arc<Self>) {
        let mut guard = self.worker.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
            guard.take();
        }

        let service = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                let job = {
                    let mut queue = service.queue.lock().await;
                    queue.recv().await
                };
                let Some(job) = job else {
                    debug!("[Sync] run queue closed, worker exiting");
                    break;
                };
                if let Err(err) = service.execute(job).await {
                    // Already recorded in the run log; background callers only see status.
                    warn!("[Sync] background run failed: {}", err);
                }
            }
        });
        *guard = Some(handle);
    }

    /// Aborts the worker. A run it was executing is marked failed and its
    /// lock released.
    pub async fn stop_worker(&self) {
        let mut guard = self.worker.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
            let _ = handle.await;
        }
        drop(guard);

        let interrupted = self.active.lock().ok().and_then(|mut active| active.take());
        if let Some(job) = interrupted {
            warn!("[Sync] run {} interrupted by worker shutdown", job.run_id);
            let completion = RunCompletion {
                status: RunStatus::Failed,
                counters: self.progress.counters(),
                duration_seconds: 0,
                error_message: Some("Run interrupted by shutdown".to_string()),
            };
            if let Err(err) = self
                .pipeline
                .stores()
                .run_log
                .finish_run(job.run_id, completion)
                .await
            {
                error!("[Sync] could not mark run {} failed: {}", job.run_id, err);
            }
            self.release_lock(&job.holder).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .map(|active| active.is_some())
            .unwrap_or(false)
    }

    /// Takes the lock and writes the `started` run log row.
    async fn admit(&self, category: RunCategory) -> Result<Admission> {
        let stores = self.pipeline.stores();
        let holder = format!("run:{}", Uuid::new_v4());
        let acquired = stores
            .run_lock
            .try_acquire(FULL_RUN_LOCK_NAME, &holder, self.pipeline.config().lock_ttl)
            .await?;
        if !acquired {
            let current = stores.run_lock.current_holder(FULL_RUN_LOCK_NAME)?;
            info!(
                "[Sync] {} run rejected, lock held by {:?}",
                category.as_str(),
                current
            );
            return Ok(Admission::Busy(current));
        }

        let run = match stores.run_log.create_run(category).await {
            Ok(run) => run,
            Err(err) => {
                self.release_lock(&holder).await;
                return Err(err);
            }
        };

        let job = RunJob {
            run_id: run.id,
            category,
            holder,
        };
        if let Ok(mut active) = self.active.lock() {
            *active = Some(job.clone());
        }
        self.progress.reset();
        self.progress
            .info(format!("Run {} ({}) accepted", run.id, category.as_str()));
        Ok(Admission::Admitted(job))
    }

    async fn execute(&self, job: RunJob) -> Result<RunLog> {
        let stores = self.pipeline.stores();
        let started = Instant::now();
        let mut counters = RunCounters::default();

        let outcome = match stores.run_log.mark_running(job.run_id).await {
            Ok(()) => {
                self.progress.info(format!("Run {} started", job.run_id));
                self.pipeline.run(job.category, &mut counters).await
            }
            Err(err) => Err(err),
        };
        let duration_seconds = started.elapsed().as_secs() as i64;
        self.progress.publish(&counters);

        let result = match outcome {
            Ok(()) => {
                let finished = stores
                    .run_log
                    .finish_run(
                        job.run_id,
                        RunCompletion {
                            status: RunStatus::Completed,
                            counters,
                            duration_seconds,
                            error_message: None,
                        },
                    )
                    .await;
                if let Ok(run) = &finished {
                    self.invalidate_caches(run).await;
                    self.progress.success(format!(
                        "Run {} completed in {}s: {} processed, {} created, {} updated",
                        run.id,
                        duration_seconds,
                        run.records_processed,
                        run.records_created,
                        run.records_updated
                    ));
                }
                finished
            }
            Err(err) => {
                self.progress
                    .error(format!("Run {} failed: {}", job.run_id, err));
                let completion = RunCompletion {
                    status: RunStatus::Failed,
                    counters,
                    duration_seconds,
                    error_message: Some(err.to_string()),
                };
                if let Err(log_err) = stores.run_log.finish_run(job.run_id, completion).await {
                    error!(
                        "[Sync] could not record failure of run {}: {}",
                        job.run_id, log_err
                    );
                }
                Err(err)
            }
        };

        self.release_lock(&job.holder).await;
        if let Ok(mut active) = self.active.lock() {
            if active.as_ref().is_some_and(|current| current.run_id == job.run_id) {
                active.take();
            }
        }
        result
    }

    async fn release_lock(&self, holder: &str) {
        match self
            .pipeline
            .stores()
            .run_lock
            .release(FULL_RUN_LOCK_NAME, holder)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!("[Sync] run lock had already passed from {}", holder),
            Err(err) => error!("[Sync] could not release run lock for {}: {}", holder, err),
        }
    }

    /// Clears the namespaces a run may have made stale and stores the run
    /// summary. Cache failures never fail the run.
    async fn invalidate_caches(&self, run: &RunLog) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let mut removed = 0usize;
        for prefix in CacheKeys::INVALIDATED_PREFIXES {
            match cache.delete_by_prefix(prefix).await {
                Ok(count) => removed += count,
                Err(err) => warn!("[Cache] could not clear '{}': {}", prefix, err),
            }
        }
        debug!("[Cache] run {} invalidated {} entries", run.id, removed);

        match serde_json::to_value(run) {
            Ok(summary) => {
                if let Err(err) = cache
                    .set(
                        CacheKeys::SYNC_STATUS,
                        summary,
                        Duration::from_secs(SYNC_STATUS_CACHE_TTL_SECS),
                    )
                    .await
                {
                    warn!("[Cache] could not store run summary: {}", err);
                }
            }
            Err(err) => warn!("[Cache] could not serialize run summary: {}", err),
        }
    }
}

#[async_trait]
impl RunServiceTrait for RunService {
    async fn start_run(&self, category: RunCategory) -> Result<StartRunOutcome> {
        let job = match self.admit(category).await? {
            Admission::Admitted(job) => job,
            Admission::Busy(holder) => return Ok(StartRunOutcome::AlreadyRunning { holder }),
        };
        let run_id = job.run_id;

        if let Err(rejected) = self.jobs.send(job) {
            let job = rejected.0;
            let message = "Run queue is closed".to_string();
            self.progress.error(message.clone());
            self.pipeline
                .stores()
                .run_log
                .finish_run(
                    job.run_id,
                    RunCompletion {
                        status: RunStatus::Failed,
                        counters: RunCounters::default(),
                        duration_seconds: 0,
                        error_message: Some(message.clone()),
                    },
                )
                .await?;
            self.release_lock(&job.holder).await;
            if let Ok(mut active) = self.active.lock() {
                active.take();
            }
            return Err(Error::sync(message));
        }
        Ok(StartRunOutcome::Accepted { run_id })
    }

    async fn run_blocking(&self, category: RunCategory) -> Result<RunLog> {
        match self.admit(category).await? {
            Admission::Admitted(job) => self.execute(job).await,
            Admission::Busy(holder) => Err(Error::sync(format!(
                "A run is already in progress (lock held by {})",
                holder.as_deref().unwrap_or("an expired holder")
            ))),
        }
    }

    fn get_run_status(&self) -> Result<RunStatusView> {
        let run_log = &self.pipeline.stores().run_log;
        let active_id = self
            .active
            .lock()
            .ok()
            .and_then(|active| active.as_ref().map(|job| job.run_id));

        let current_run = match active_id {
            Some(run_id) => run_log.get_run(run_id)?,
            None => None,
        };
        let last_run = run_log
            .recent_runs(10)?
            .into_iter()
            .find(|run| run.status.is_terminal());

        Ok(RunStatusView {
            state: if active_id.is_some() {
                RunnerState::Running
            } else {
                RunnerState::Idle
            },
            current_run,
            entries: self.progress.entries(),
            counters: self.progress.counters(),
            last_run,
        })
    }
}
