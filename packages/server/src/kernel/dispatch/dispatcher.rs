//! Bounded-concurrency job dispatcher.
//!
//! The dispatcher admits enqueued jobs in FIFO order into a capped in-flight
//! set, runs each admitted job as a tokio task, retries transient failures
//! with exponential backoff, and evicts terminal jobs after a retention
//! window. One instance is constructed per job kind and shared by cloning.
//!
//! # Architecture
//!
//! ```text
//! enqueue() ──► pending (FIFO) ──► drive loop ──► spawned attempt task
//!                                     ▲                  │
//!                                     └── wake ◄── settle(outcome)
//! ```
//!
//! The drive loop is spawned lazily on the first enqueue and exits when no
//! pending or in-flight work remains; the next enqueue restarts it. Slot
//! accounting changes only when an attempt task settles, so admission never
//! blocks on running work.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::error::Elapsed;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::job::{InvalidPayload, Job, JobError, JobSnapshot, JobState, PoolStatus};

/// Failure reason recorded when an attempt outlives the job timeout.
pub const TIMED_OUT_REASON: &str = "processing timed out";

/// Handler executed for each admitted job.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Payload: Clone + Send + Sync + 'static;

    /// Reject malformed payloads at enqueue time. Validation errors are never
    /// retried; they surface immediately to the caller.
    fn validate(&self, _payload: &Self::Payload) -> Result<(), String> {
        Ok(())
    }

    /// Run one attempt. `cancel` must be checked before and after every
    /// external call; a cancelled job's return value is discarded.
    async fn execute(
        &self,
        job_id: Uuid,
        payload: Self::Payload,
        cancel: CancellationToken,
    ) -> Result<serde_json::Value, JobError>;

    /// Called once when a job reaches `Failed` (permanent error, timeout, or
    /// retries exhausted).
    async fn on_failure(&self, _job_id: Uuid, _payload: Self::Payload, _reason: &str) {}

    /// Called once when a job is cancelled.
    async fn on_cancel(&self, _job_id: Uuid, _payload: Self::Payload) {}
}

/// Tuning knobs for a dispatcher instance.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum number of jobs running at once.
    pub max_concurrent: usize,
    /// Retries allowed after the first attempt, for transient failures only.
    pub max_retries: u32,
    /// Base delay for exponential backoff (`base * 2^attempts`).
    pub backoff_base: Duration,
    /// Overall deadline for a single attempt.
    pub job_timeout: Duration,
    /// How long terminal jobs stay queryable before eviction.
    pub retention: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            max_retries: 2,
            backoff_base: Duration::from_millis(500),
            job_timeout: Duration::from_secs(30),
            retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

struct DispatchState<P> {
    pending: VecDeque<Uuid>,
    in_flight: HashSet<Uuid>,
    jobs: HashMap<Uuid, Job<P>>,
    driver_running: bool,
}

struct Shared<H: JobHandler> {
    handler: H,
    config: DispatcherConfig,
    state: Mutex<DispatchState<H::Payload>>,
    wake: Notify,
}

/// Bounded-concurrency dispatcher for one kind of background job.
pub struct Dispatcher<H: JobHandler> {
    inner: Arc<Shared<H>>,
}

impl<H: JobHandler> Clone for Dispatcher<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: JobHandler> Dispatcher<H> {
    /// Create a dispatcher with default configuration.
    pub fn new(handler: H) -> Self {
        Self::with_config(handler, DispatcherConfig::default())
    }

    /// Create a dispatcher with custom configuration.
    pub fn with_config(handler: H, config: DispatcherConfig) -> Self {
        Self {
            inner: Arc::new(Shared {
                handler,
                config,
                state: Mutex::new(DispatchState {
                    pending: VecDeque::new(),
                    in_flight: HashSet::new(),
                    jobs: HashMap::new(),
                    driver_running: false,
                }),
                wake: Notify::new(),
            }),
        }
    }

    /// Enqueue a job. Returns immediately; never waits for a worker slot.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, payload: H::Payload) -> Result<Uuid, InvalidPayload> {
        self.inner
            .handler
            .validate(&payload)
            .map_err(InvalidPayload)?;

        let job = Job::new(payload);
        let job_id = job.id;
        {
            let mut st = self.inner.state.lock().unwrap();
            st.jobs.insert(job_id, job);
            st.pending.push_back(job_id);
        }

        debug!(job_id = %job_id, "job enqueued");
        ensure_driver(&self.inner);
        self.inner.wake.notify_one();
        Ok(job_id)
    }

    /// Cancel a queued or processing job.
    ///
    /// Returns `false` if the job is unknown or already terminal; cancelling
    /// twice is a safe no-op. A processing job's in-flight work is not
    /// forcibly aborted, but its outcome is discarded when it returns and its
    /// slot is released when the attempt task drains.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        let payload = {
            let mut st = self.inner.state.lock().unwrap();

            let (payload, epoch, was_queued) = {
                let Some(job) = st.jobs.get_mut(&job_id) else {
                    return false;
                };
                if job.state.is_terminal() {
                    return false;
                }
                let was_queued = job.state == JobState::Queued;
                job.state = JobState::Cancelled;
                job.completed_at = Some(Utc::now());
                job.cancel.cancel();
                job.eviction_epoch += 1;
                (job.payload.clone(), job.eviction_epoch, was_queued)
            };

            if was_queued {
                st.pending.retain(|id| *id != job_id);
            }
            schedule_eviction(&self.inner, job_id, epoch);
            payload
        };

        info!(job_id = %job_id, "job cancelled");
        let shared = Arc::clone(&self.inner);
        tokio::spawn(async move {
            shared.handler.on_cancel(job_id, payload).await;
        });
        self.inner.wake.notify_one();
        true
    }

    /// Look up a job by id. Returns `None` for unknown or evicted jobs.
    pub fn status(&self, job_id: Uuid) -> Option<JobSnapshot> {
        let st = self.inner.state.lock().unwrap();
        st.jobs.get(&job_id).map(Job::snapshot)
    }

    /// Aggregate queue counters.
    pub fn pool_status(&self) -> PoolStatus {
        let st = self.inner.state.lock().unwrap();
        PoolStatus {
            pending: st.pending.len(),
            in_flight: st.in_flight.len(),
            max_concurrent: self.inner.config.max_concurrent,
        }
    }
}

/// Spawn the drive loop if it is not already running.
fn ensure_driver<H: JobHandler>(shared: &Arc<Shared<H>>) {
    {
        let mut st = shared.state.lock().unwrap();
        if st.driver_running {
            return;
        }
        st.driver_running = true;
    }
    tokio::spawn(drive(Arc::clone(shared)));
}

/// The admission loop: fill free slots from the queue, then sleep until
/// woken by an enqueue, a settled attempt, a cancel, or a backoff deadline.
async fn drive<H: JobHandler>(shared: Arc<Shared<H>>) {
    loop {
        let wait_until: Option<Instant> = {
            let mut st = shared.state.lock().unwrap();
            let now = Instant::now();

            // Fill free slots from the front of the queue, FIFO among
            // jobs whose backoff deadline has passed.
            while st.in_flight.len() < shared.config.max_concurrent {
                let position = st.pending.iter().position(|id| {
                    st.jobs
                        .get(id)
                        .map_or(true, |job| job.not_before.map_or(true, |t| t <= now))
                });
                let Some(position) = position else { break };
                let Some(job_id) = st.pending.remove(position) else {
                    break;
                };

                let Some(job) = st.jobs.get_mut(&job_id) else {
                    continue;
                };
                if job.state != JobState::Queued {
                    continue;
                }

                // Ownership transfers to the attempt task here; nothing else
                // mutates the job until it settles or is cancelled.
                job.state = JobState::Processing;
                job.started_at = Some(Utc::now());
                job.not_before = None;
                let payload = job.payload.clone();
                let token = job.cancel.clone();
                st.in_flight.insert(job_id);
                spawn_attempt(&shared, job_id, payload, token);
            }

            if st.pending.is_empty() && st.in_flight.is_empty() {
                // Nothing left to do; the next enqueue restarts the loop.
                st.driver_running = false;
                return;
            }

            if st.in_flight.len() < shared.config.max_concurrent {
                st.pending
                    .iter()
                    .filter_map(|id| st.jobs.get(id).and_then(|job| job.not_before))
                    .min()
            } else {
                None
            }
        };

        match wait_until {
            Some(deadline) => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => shared.wake.notified().await,
        }
    }
}

/// Run one attempt under the job timeout, then settle the outcome.
fn spawn_attempt<H: JobHandler>(
    shared: &Arc<Shared<H>>,
    job_id: Uuid,
    payload: H::Payload,
    cancel: CancellationToken,
) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        let attempt_payload = payload.clone();
        let outcome = tokio::time::timeout(
            shared.config.job_timeout,
            shared.handler.execute(job_id, attempt_payload, cancel),
        )
        .await;
        settle(shared, job_id, payload, outcome).await;
    });
}

/// Apply an attempt's outcome: complete, retry with backoff, or fail.
async fn settle<H: JobHandler>(
    shared: Arc<Shared<H>>,
    job_id: Uuid,
    payload: H::Payload,
    outcome: Result<Result<serde_json::Value, JobError>, Elapsed>,
) {
    enum Next {
        Discarded,
        Completed { epoch: u64 },
        Retry,
        Failed { reason: String, epoch: u64 },
    }

    let failure: Option<String> = {
        let mut st = shared.state.lock().unwrap();
        st.in_flight.remove(&job_id);

        let next = match st.jobs.get_mut(&job_id) {
            None => Next::Discarded,
            Some(job) if job.state == JobState::Cancelled => {
                debug!(job_id = %job_id, "discarding outcome of cancelled job");
                Next::Discarded
            }
            Some(job) => match outcome {
                Err(_) => {
                    // The timer won the race; stop any work the attempt left
                    // behind and fail with a distinguishable reason.
                    job.cancel.cancel();
                    job.state = JobState::Failed;
                    job.completed_at = Some(Utc::now());
                    job.failure_reason = Some(TIMED_OUT_REASON.to_string());
                    job.eviction_epoch += 1;
                    warn!(job_id = %job_id, attempts = job.attempts, "job timed out");
                    Next::Failed {
                        reason: TIMED_OUT_REASON.to_string(),
                        epoch: job.eviction_epoch,
                    }
                }
                Ok(Ok(result)) => {
                    job.state = JobState::Completed;
                    job.completed_at = Some(Utc::now());
                    job.result = Some(result);
                    job.eviction_epoch += 1;
                    debug!(job_id = %job_id, attempts = job.attempts, "job completed");
                    Next::Completed {
                        epoch: job.eviction_epoch,
                    }
                }
                Ok(Err(error))
                    if error.should_retry() && job.attempts < shared.config.max_retries =>
                {
                    job.attempts += 1;
                    job.state = JobState::Queued;
                    job.started_at = None;
                    let delay = shared.config.backoff_base * 2u32.pow(job.attempts);
                    job.not_before = Some(Instant::now() + delay);
                    warn!(
                        job_id = %job_id,
                        attempts = job.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient job failure, retrying"
                    );
                    Next::Retry
                }
                Ok(Err(error)) => {
                    let reason = error.to_string();
                    job.state = JobState::Failed;
                    job.completed_at = Some(Utc::now());
                    job.failure_reason = Some(reason.clone());
                    job.eviction_epoch += 1;
                    warn!(job_id = %job_id, attempts = job.attempts, error = %error, "job failed");
                    Next::Failed {
                        reason,
                        epoch: job.eviction_epoch,
                    }
                }
            },
        };

        match next {
            Next::Discarded => None,
            Next::Completed { epoch } => {
                schedule_eviction(&shared, job_id, epoch);
                None
            }
            Next::Retry => {
                st.pending.push_back(job_id);
                None
            }
            Next::Failed { reason, epoch } => {
                schedule_eviction(&shared, job_id, epoch);
                Some(reason)
            }
        }
    };

    shared.wake.notify_one();

    if let Some(reason) = failure {
        shared.handler.on_failure(job_id, payload, &reason).await;
    }
}

/// Remove a terminal job from the map once its retention window passes.
///
/// The epoch guard makes the timer a no-op if the job transitioned again
/// after scheduling, so races cannot double-evict or evict live jobs.
fn schedule_eviction<H: JobHandler>(shared: &Arc<Shared<H>>, job_id: Uuid, epoch: u64) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        tokio::time::sleep(shared.config.retention).await;
        let mut st = shared.state.lock().unwrap();
        let evict = st
            .jobs
            .get(&job_id)
            .map_or(false, |job| job.state.is_terminal() && job.eviction_epoch == epoch);
        if evict {
            st.jobs.remove(&job_id);
            debug!(job_id = %job_id, "evicted retained job");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::watch;

    #[derive(Clone)]
    enum Behavior {
        Succeed,
        AlwaysTransient,
        Permanent,
        /// Park until the gate flips to true, then succeed.
        Hold,
        /// Sleep far past any job timeout.
        SleepForever,
    }

    #[derive(Clone, Default)]
    struct Probe {
        attempts: Arc<AtomicU32>,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        order: Arc<StdMutex<Vec<String>>>,
        attempt_at: Arc<StdMutex<Vec<Instant>>>,
        failures: Arc<StdMutex<Vec<String>>>,
        cancellations: Arc<AtomicU32>,
        saw_cancel_token: Arc<AtomicBool>,
    }

    struct ScriptedHandler {
        behavior: Behavior,
        probe: Probe,
        gate: watch::Receiver<bool>,
    }

    fn handler(behavior: Behavior) -> (ScriptedHandler, Probe, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let probe = Probe::default();
        (
            ScriptedHandler {
                behavior,
                probe: probe.clone(),
                gate: rx,
            },
            probe,
            tx,
        )
    }

    #[async_trait]
    impl JobHandler for ScriptedHandler {
        type Payload = String;

        fn validate(&self, payload: &String) -> Result<(), String> {
            if payload.trim().is_empty() {
                return Err("payload must not be empty".into());
            }
            Ok(())
        }

        async fn execute(
            &self,
            _job_id: Uuid,
            payload: String,
            cancel: CancellationToken,
        ) -> Result<Value, JobError> {
            self.probe.attempts.fetch_add(1, Ordering::SeqCst);
            self.probe.attempt_at.lock().unwrap().push(Instant::now());
            self.probe.order.lock().unwrap().push(payload);
            let now_running = self.probe.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.probe.peak.fetch_max(now_running, Ordering::SeqCst);

            let result = match self.behavior {
                Behavior::Succeed => Ok(json!({ "ok": true })),
                Behavior::AlwaysTransient => Err(JobError::transient("gateway connection reset")),
                Behavior::Permanent => Err(JobError::permanent("malformed input")),
                Behavior::Hold => {
                    let mut gate = self.gate.clone();
                    while !*gate.borrow() {
                        if gate.changed().await.is_err() {
                            break;
                        }
                    }
                    self.probe
                        .saw_cancel_token
                        .store(cancel.is_cancelled(), Ordering::SeqCst);
                    Ok(json!({ "ok": true }))
                }
                Behavior::SleepForever => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Value::Null)
                }
            };

            self.probe.running.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn on_failure(&self, _job_id: Uuid, _payload: String, reason: &str) {
            self.probe.failures.lock().unwrap().push(reason.to_string());
        }

        async fn on_cancel(&self, _job_id: Uuid, _payload: String) {
            self.probe.cancellations.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..2000 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test(start_paused = true)]
    async fn five_jobs_three_slots_admission_scenario() {
        let (handler, probe, gate) = handler(Behavior::Hold);
        let dispatcher = Dispatcher::new(handler);

        let ids: Vec<Uuid> = (0..5)
            .map(|i| dispatcher.enqueue(format!("job-{}", i)).unwrap())
            .collect();

        // Three admitted immediately, two queued behind the cap.
        let d = dispatcher.clone();
        wait_for(move || {
            let pool = d.pool_status();
            pool.in_flight == 3 && pool.pending == 2
        })
        .await;

        let states: Vec<JobState> = ids
            .iter()
            .map(|id| dispatcher.status(*id).unwrap().state)
            .collect();
        assert_eq!(
            states
                .iter()
                .filter(|s| **s == JobState::Processing)
                .count(),
            3
        );
        assert_eq!(states.iter().filter(|s| **s == JobState::Queued).count(), 2);

        // Releasing the gate drains everything without further intervention.
        gate.send(true).unwrap();
        let d = dispatcher.clone();
        wait_for(move || {
            let pool = d.pool_status();
            pool.in_flight == 0 && pool.pending == 0
        })
        .await;

        for id in &ids {
            assert_eq!(dispatcher.status(*id).unwrap().state, JobState::Completed);
        }
        assert!(probe.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(probe.attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn fifo_admission_order() {
        let (handler, probe, _gate) = handler(Behavior::Succeed);
        let dispatcher = Dispatcher::with_config(
            handler,
            DispatcherConfig {
                max_concurrent: 1,
                ..Default::default()
            },
        );

        dispatcher.enqueue("first".to_string()).unwrap();
        dispatcher.enqueue("second".to_string()).unwrap();
        dispatcher.enqueue("third".to_string()).unwrap();

        let p = probe.clone();
        wait_for(move || p.attempts.load(Ordering::SeqCst) == 3).await;

        assert_eq!(
            *probe.order.lock().unwrap(),
            vec!["first", "second", "third"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_exactly_max_retries_plus_one_times() {
        let (handler, probe, _gate) = handler(Behavior::AlwaysTransient);
        let dispatcher = Dispatcher::new(handler);
        let id = dispatcher.enqueue("doomed".to_string()).unwrap();

        let d = dispatcher.clone();
        wait_for(move || d.status(id).map(|s| s.state) == Some(JobState::Failed)).await;

        // max_retries = 2 means exactly 3 attempts, never fewer, never more.
        assert_eq!(probe.attempts.load(Ordering::SeqCst), 3);
        let snapshot = dispatcher.status(id).unwrap();
        assert_eq!(snapshot.attempts, 2);
        assert_eq!(
            snapshot.failure_reason.as_deref(),
            Some("gateway connection reset")
        );

        // The failure hook fires once, after the terminal transition.
        let p = probe.clone();
        wait_for(move || p.failures.lock().unwrap().len() == 1).await;
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_delay_grows_between_attempts() {
        let (handler, probe, _gate) = handler(Behavior::AlwaysTransient);
        let dispatcher = Dispatcher::new(handler);
        let id = dispatcher.enqueue("doomed".to_string()).unwrap();

        let d = dispatcher.clone();
        wait_for(move || d.status(id).map(|s| s.state) == Some(JobState::Failed)).await;

        let attempt_at = probe.attempt_at.lock().unwrap();
        assert_eq!(attempt_at.len(), 3);
        let first_gap = attempt_at[1] - attempt_at[0];
        let second_gap = attempt_at[2] - attempt_at[1];
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_not_retried() {
        let (handler, probe, _gate) = handler(Behavior::Permanent);
        let dispatcher = Dispatcher::new(handler);
        let id = dispatcher.enqueue("broken".to_string()).unwrap();

        let d = dispatcher.clone();
        wait_for(move || d.status(id).map(|s| s.state) == Some(JobState::Failed)).await;

        assert_eq!(probe.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(
            dispatcher.status(id).unwrap().failure_reason.as_deref(),
            Some("malformed input")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_attempt_fails_with_distinguishable_reason() {
        let (handler, probe, _gate) = handler(Behavior::SleepForever);
        let dispatcher = Dispatcher::new(handler);
        let id = dispatcher.enqueue("slow".to_string()).unwrap();

        let d = dispatcher.clone();
        wait_for(move || d.status(id).map(|s| s.state) == Some(JobState::Failed)).await;

        assert_eq!(
            dispatcher.status(id).unwrap().failure_reason.as_deref(),
            Some(TIMED_OUT_REASON)
        );

        let p = probe.clone();
        wait_for(move || p.failures.lock().unwrap().len() == 1).await;
        assert_eq!(probe.failures.lock().unwrap()[0], TIMED_OUT_REASON);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_queued_job_removes_it_from_the_queue() {
        let (handler, _probe, gate) = handler(Behavior::Hold);
        let dispatcher = Dispatcher::with_config(
            handler,
            DispatcherConfig {
                max_concurrent: 1,
                ..Default::default()
            },
        );

        let first = dispatcher.enqueue("running".to_string()).unwrap();
        let second = dispatcher.enqueue("waiting".to_string()).unwrap();

        let d = dispatcher.clone();
        wait_for(move || d.pool_status().in_flight == 1).await;

        assert!(dispatcher.cancel(second));
        assert_eq!(dispatcher.status(second).unwrap().state, JobState::Cancelled);
        assert_eq!(dispatcher.pool_status().pending, 0);

        // Cancelling an already-terminal job is a no-op returning false.
        assert!(!dispatcher.cancel(second));

        gate.send(true).unwrap();
        let d = dispatcher.clone();
        wait_for(move || d.status(first).map(|s| s.state) == Some(JobState::Completed)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_processing_job_discards_its_outcome() {
        let (handler, probe, gate) = handler(Behavior::Hold);
        let dispatcher = Dispatcher::new(handler);
        let id = dispatcher.enqueue("inflight".to_string()).unwrap();

        let d = dispatcher.clone();
        wait_for(move || d.pool_status().in_flight == 1).await;

        assert!(dispatcher.cancel(id));
        assert_eq!(dispatcher.status(id).unwrap().state, JobState::Cancelled);

        // Let the attempt finish; its Ok result must not overwrite Cancelled.
        gate.send(true).unwrap();
        let d = dispatcher.clone();
        wait_for(move || d.pool_status().in_flight == 0).await;

        let snapshot = dispatcher.status(id).unwrap();
        assert_eq!(snapshot.state, JobState::Cancelled);
        assert!(snapshot.result.is_none());
        assert!(probe.saw_cancel_token.load(Ordering::SeqCst));

        let p = probe.clone();
        wait_for(move || p.cancellations.load(Ordering::SeqCst) == 1).await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_unknown_job_returns_false() {
        let (handler, _probe, _gate) = handler(Behavior::Succeed);
        let dispatcher = Dispatcher::new(handler);
        assert!(!dispatcher.cancel(Uuid::new_v4()));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_payload_is_rejected_at_enqueue() {
        let (handler, probe, _gate) = handler(Behavior::Succeed);
        let dispatcher = Dispatcher::new(handler);

        let result = dispatcher.enqueue("   ".to_string());
        assert!(result.is_err());

        let pool = dispatcher.pool_status();
        assert_eq!(pool.pending, 0);
        assert_eq!(pool.in_flight, 0);
        assert_eq!(probe.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_jobs_are_evicted_after_retention() {
        let (handler, _probe, _gate) = handler(Behavior::Succeed);
        let dispatcher = Dispatcher::with_config(
            handler,
            DispatcherConfig {
                retention: Duration::from_millis(200),
                ..Default::default()
            },
        );
        let id = dispatcher.enqueue("short-lived".to_string()).unwrap();

        let d = dispatcher.clone();
        wait_for(move || d.status(id).map(|s| s.state) == Some(JobState::Completed)).await;

        // Still queryable inside the retention window, gone after it.
        assert!(dispatcher.status(id).is_some());
        let d = dispatcher.clone();
        wait_for(move || d.status(id).is_none()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn slots_refill_as_jobs_complete() {
        let (handler, probe, gate) = handler(Behavior::Hold);
        let dispatcher = Dispatcher::with_config(
            handler,
            DispatcherConfig {
                max_concurrent: 2,
                ..Default::default()
            },
        );

        for i in 0..6 {
            dispatcher.enqueue(format!("job-{}", i)).unwrap();
        }
        gate.send(true).unwrap();

        let d = dispatcher.clone();
        wait_for(move || {
            let pool = d.pool_status();
            pool.pending == 0 && pool.in_flight == 0
        })
        .await;

        assert_eq!(probe.attempts.load(Ordering::SeqCst), 6);
        assert!(probe.peak.load(Ordering::SeqCst) <= 2);
    }
}
