//! The queue engine.
//!
//! One dispatcher task per registered job type claims work from the store
//! while it holds a semaphore permit, so at most `concurrency` jobs of that
//! type are active at once. Each claimed job runs on a tracked worker task
//! with its own cancellation token kept in the in-flight map. Whoever
//! removes a job from that map (its worker, the watchdog or a forced
//! shutdown) is the only writer of the job's outcome. A worker marks its job
//! as settling before it takes the job out of the map, so the watchdog never
//! mistakes a job that is being settled locally for one owned by nobody.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use gf_core::{Error, JobData, JobId, JobOptions, Result};
use gf_db::{Job, JobCounts, JobFilter, JobStore, LogEntry};
use parking_lot::Mutex;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::context::JobContext;
use crate::handler::JobHandler;
use crate::settings::QueueSettings;

/// Time cancelled workers get to unwind after a forced shutdown.
const UNWIND_GRACE: Duration = Duration::from_secs(1);

/// Outcome of [`Queue::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every in-flight job finished within the timeout.
    pub drained: bool,
    /// Jobs that were still running at the timeout and were marked failed.
    pub forced: Vec<JobId>,
}

struct Registration {
    job_type: String,
    concurrency: usize,
    handler: Arc<dyn JobHandler>,
    wake: Arc<Notify>,
}

pub(crate) struct Inner {
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) settings: QueueSettings,
    registrations: Mutex<Vec<Arc<Registration>>>,
    wakers: DashMap<String, Arc<Notify>>,
    pub(crate) dispatch_cancel: CancellationToken,
    pub(crate) in_flight: DashMap<JobId, CancellationToken>,
    pub(crate) settling: DashSet<JobId>,
    tracker: TaskTracker,
    background: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

/// Durable priority job queue.
///
/// Cloning is cheap; clones share the same engine.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<Inner>,
}

impl Queue {
    pub fn new(store: Arc<dyn JobStore>, settings: QueueSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                settings,
                registrations: Mutex::new(Vec::new()),
                wakers: DashMap::new(),
                dispatch_cancel: CancellationToken::new(),
                in_flight: DashMap::new(),
                settling: DashSet::new(),
                tracker: TaskTracker::new(),
                background: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.inner.store
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.inner.settings
    }

    /// Register `handler` for `job_type` with a worker pool of
    /// `concurrency` slots. Must be called before [`start`](Queue::start).
    pub fn process(
        &self,
        job_type: impl Into<String>,
        concurrency: usize,
        handler: impl JobHandler + 'static,
    ) -> Result<()> {
        let job_type = job_type.into();
        if self.inner.started.load(Ordering::SeqCst) {
            return Err(Error::Validation(format!(
                "cannot register '{job_type}' after the queue has started"
            )));
        }
        if concurrency == 0 {
            return Err(Error::Validation(format!(
                "concurrency for '{job_type}' must be at least 1"
            )));
        }

        let mut registrations = self.inner.registrations.lock();
        if registrations.iter().any(|r| r.job_type == job_type) {
            return Err(Error::Validation(format!(
                "a handler for '{job_type}' is already registered"
            )));
        }

        let wake = Arc::new(Notify::new());
        self.inner.wakers.insert(job_type.clone(), Arc::clone(&wake));
        registrations.push(Arc::new(Registration {
            job_type,
            concurrency,
            handler: Arc::new(handler),
            wake,
        }));
        Ok(())
    }

    /// Persist a new job and wake its dispatcher. The job is visible to
    /// [`get`](Queue::get) as soon as this returns.
    pub fn enqueue(&self, job_type: &str, data: JobData, options: JobOptions) -> Result<Job> {
        let job = self.inner.store.create(job_type, data, &options)?;
        tracing::info!(
            job_id = %job.id,
            job_type,
            priority = %job.priority,
            "Job enqueued"
        );
        self.inner.wake(job_type);
        Ok(job)
    }

    pub fn get(&self, id: JobId) -> Result<Job> {
        self.inner.store.get(id)
    }

    pub fn logs(&self, id: JobId) -> Result<Vec<LogEntry>> {
        self.inner.store.logs(id)
    }

    pub fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        self.inner.store.list(filter)
    }

    pub fn counts(&self, job_type: Option<&str>) -> Result<JobCounts> {
        self.inner.store.counts(job_type)
    }

    /// Jobs currently owned by a local worker.
    pub fn in_flight(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.inner.in_flight.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Recover jobs left active by a previous process, then spawn one
    /// dispatcher per registered type and the watchdog.
    pub fn start(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Validation("queue already started".into()));
        }

        let recovered = self.inner.recover_orphans()?;
        if recovered > 0 {
            tracing::warn!(count = recovered, "Recovered jobs left active by a previous run");
        }

        let registrations: Vec<Arc<Registration>> = self.inner.registrations.lock().clone();
        let mut background = self.inner.background.lock();
        for reg in registrations {
            background.push(tokio::spawn(dispatch_loop(Arc::clone(&self.inner), reg)));
        }
        if let Some(every) = self.inner.settings.watchdog_interval {
            background.push(tokio::spawn(crate::watchdog::run(
                Arc::clone(&self.inner),
                every,
            )));
        }

        tracing::info!("Queue started");
        Ok(())
    }

    /// Stop dispatching and drain in-flight jobs.
    ///
    /// Waits up to `timeout` for running jobs to finish. Jobs still running
    /// afterwards are cancelled and marked `failed` with reason `shutdown`.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        tracing::info!(timeout_secs = timeout.as_secs_f64(), "Queue shutting down");
        self.inner.dispatch_cancel.cancel();

        // Once the dispatchers have exited every worker is in the tracker.
        let handles = std::mem::take(&mut *self.inner.background.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }

        self.inner.tracker.close();
        let drained = tokio::time::timeout(timeout, self.inner.tracker.wait())
            .await
            .is_ok();

        let mut forced = Vec::new();
        if !drained {
            let ids: Vec<JobId> = self.inner.in_flight.iter().map(|e| *e.key()).collect();
            for id in ids {
                let Some((_, token)) = self.inner.in_flight.remove(&id) else {
                    continue;
                };
                token.cancel();

                let reason = Error::Shutdown.to_string();
                self.inner.append_log(id, &format!("Job failed: {reason}"));
                match self.inner.store.fail(id, &reason, None) {
                    Ok(_) => tracing::warn!(job_id = %id, "Job failed by shutdown"),
                    Err(e) => {
                        tracing::error!(job_id = %id, error = %e, "Failed to record shutdown failure")
                    }
                }
                forced.push(id);
            }

            if tokio::time::timeout(UNWIND_GRACE, self.inner.tracker.wait())
                .await
                .is_err()
            {
                tracing::warn!("Cancelled workers did not unwind in time");
            }
        }

        forced.sort();
        tracing::info!(drained, forced = forced.len(), "Queue stopped");
        ShutdownReport { drained, forced }
    }
}

impl Inner {
    fn wake(&self, job_type: &str) {
        if let Some(wake) = self.wakers.get(job_type) {
            wake.notify_one();
        }
    }

    /// Wake the dispatcher of `job_type` once `at` has passed.
    fn wake_at(&self, job_type: &str, at: DateTime<Utc>) {
        let Some(wake) = self.wakers.get(job_type).map(|w| Arc::clone(w.value())) else {
            return;
        };
        let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        if delay.is_zero() {
            wake.notify_one();
            return;
        }
        let cancel = self.dispatch_cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => wake.notify_one(),
                _ = cancel.cancelled() => {}
            }
        });
    }

    /// Append to the job log; a store error is only traced.
    pub(crate) fn append_log(&self, id: JobId, message: &str) {
        if let Err(e) = self.store.append_log(id, message) {
            tracing::warn!(job_id = %id, error = %e, "Failed to append job log");
        }
    }

    /// Apply the failure policy: delayed retry while attempts remain and the
    /// error is retryable, otherwise terminal failure.
    pub(crate) fn record_failure(&self, job: &Job, err: &Error) {
        let reason = err.to_string();
        let retry_at = self.settings.backoff.retry_at(job, err, Utc::now());

        match self.store.fail(job.id, &reason, retry_at) {
            Ok(_) => self.failure_recorded(job, &reason, retry_at),
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to record job failure")
            }
        }
    }

    /// [`record_failure`](Inner::record_failure) for a job nobody here owns,
    /// applied only if the job is unchanged since `job` was read. Returns
    /// whether the failure was written.
    pub(crate) fn record_stale_failure(&self, job: &Job, err: &Error) -> bool {
        let reason = err.to_string();
        let retry_at = self.settings.backoff.retry_at(job, err, Utc::now());

        match self.store.fail_stale(job.id, &reason, retry_at, &job.updated_at) {
            Ok(Some(_)) => {
                self.failure_recorded(job, &reason, retry_at);
                true
            }
            Ok(None) => {
                tracing::debug!(job_id = %job.id, "Job moved on before it could be reclaimed");
                false
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to record job failure");
                false
            }
        }
    }

    fn failure_recorded(&self, job: &Job, reason: &str, retry_at: Option<DateTime<Utc>>) {
        match retry_at {
            Some(at) => {
                tracing::info!(
                    job_id = %job.id,
                    attempt = job.attempts_made,
                    max_attempts = job.max_attempts,
                    retry_at = %at,
                    error = %reason,
                    "Scheduling retry"
                );
                self.wake_at(&job.job_type, at);
            }
            None => tracing::error!(
                job_id = %job.id,
                attempt = job.attempts_made,
                error = %reason,
                "Job failed"
            ),
        }
    }

    fn spawn_worker(
        self: &Arc<Self>,
        job: Job,
        handler: Arc<dyn JobHandler>,
        permit: OwnedSemaphorePermit,
    ) {
        let token = CancellationToken::new();
        self.in_flight.insert(job.id, token.clone());

        let inner = Arc::clone(self);
        self.tracker.spawn(async move {
            let _permit = permit;
            inner.run_job(job, handler, token).await;
        });
    }

    async fn run_job(&self, job: Job, handler: Arc<dyn JobHandler>, token: CancellationToken) {
        let job_id = job.id;
        tracing::info!(
            job_id = %job_id,
            job_type = %job.job_type,
            attempt = job.attempts_made,
            max_attempts = job.max_attempts,
            "Processing job"
        );

        let ctx = JobContext::new(job.clone(), Arc::clone(&self.store), token.clone());
        let mut work = handler.process(ctx);

        let mut heartbeat = tokio::time::interval(self.settings.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.reset();

        let outcome = loop {
            tokio::select! {
                result = &mut work => break Some(result),
                _ = token.cancelled() => break None,
                _ = heartbeat.tick() => match self.store.touch(job_id) {
                    Ok(true) => {}
                    Ok(false) => tracing::debug!(job_id = %job_id, "Heartbeat on a job that is no longer active"),
                    Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Heartbeat failed"),
                },
            }
        };
        // Dropping the handler future kills any child process it spawned.
        drop(work);

        self.settling.insert(job_id);
        if self.in_flight.remove(&job_id).is_none() {
            self.settling.remove(&job_id);
            tracing::debug!(job_id = %job_id, "Job outcome already recorded elsewhere");
            return;
        }

        match outcome {
            Some(Ok(())) => match self.store.complete(job_id) {
                Ok(_) => {
                    self.append_log(job_id, "Job completed");
                    tracing::info!(job_id = %job_id, "Job completed");
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to record job completion")
                }
            },
            Some(Err(e)) => {
                tracing::warn!(job_id = %job_id, kind = e.kind(), error = %e, "Job attempt failed");
                self.append_log(job_id, &format!("Job failed: {e}"));
                self.record_failure(&job, &e);
            }
            None => {
                let e = Error::Internal("job cancelled".into());
                self.append_log(job_id, &format!("Job failed: {e}"));
                self.record_failure(&job, &e);
            }
        }
        self.settling.remove(&job_id);
    }
}

async fn dispatch_loop(inner: Arc<Inner>, reg: Arc<Registration>) {
    let semaphore = Arc::new(Semaphore::new(reg.concurrency));
    tracing::info!(
        job_type = %reg.job_type,
        concurrency = reg.concurrency,
        "Dispatcher started"
    );

    loop {
        let permit = tokio::select! {
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = inner.dispatch_cancel.cancelled() => break,
        };
        if inner.dispatch_cancel.is_cancelled() {
            break;
        }

        match inner.store.claim_next(&reg.job_type) {
            Ok(Some(job)) => {
                inner.spawn_worker(job, Arc::clone(&reg.handler), permit);
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(job_type = %reg.job_type, error = %e, "Failed to claim next job")
            }
        }
        drop(permit);

        tokio::select! {
            _ = reg.wake.notified() => {}
            _ = tokio::time::sleep(inner.settings.poll_interval) => {}
            _ = inner.dispatch_cancel.cancelled() => break,
        }
    }

    tracing::info!(job_type = %reg.job_type, "Dispatcher stopped");
}
