//! # Worker Pool
//!
//! Owns the polling workers that drain the job queue, plus the background
//! loop that applies autoscaler recommendations. Each worker is a tokio
//! task that claims one job at a time and checks its stop flag between
//! jobs, so retiring a worker never abandons a job mid-flight.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::FlowgateConfig;
use crate::error::Result;
use crate::logging;
use crate::queue::job::JobStatus;
use crate::queue::provider::QueueProvider;
use crate::queue::traits::JobQueue;
use crate::scaling::{Autoscaler, EngineState, ScaleDirection};
use crate::worker::metrics::LatencyTracker;
use crate::worker::processor::JobProcessor;

struct WorkerHandle {
    worker_id: usize,
    stop_flag: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// Elastic pool of queue-polling workers
pub struct WorkerPool {
    queue: Arc<QueueProvider>,
    processor: Arc<dyn JobProcessor>,
    autoscaler: Autoscaler,
    poll_interval: Duration,
    workers: Mutex<Vec<WorkerHandle>>,
    in_flight: Arc<AtomicUsize>,
    latency: Arc<LatencyTracker>,
    running: AtomicBool,
    shutdown_notify: Arc<Notify>,
    last_scale_time: Mutex<Option<Instant>>,
    next_worker_id: AtomicUsize,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<QueueProvider>,
        processor: Arc<dyn JobProcessor>,
        config: &FlowgateConfig,
    ) -> Self {
        Self {
            queue,
            processor,
            autoscaler: Autoscaler::new(config.scaling.clone()),
            poll_interval: config.queue.poll_interval(),
            workers: Mutex::new(Vec::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            latency: Arc::new(LatencyTracker::default()),
            running: AtomicBool::new(false),
            shutdown_notify: Arc::new(Notify::new()),
            last_scale_time: Mutex::new(None),
            next_worker_id: AtomicUsize::new(1),
        }
    }

    /// Spawn the minimum worker complement and the scaling loop.
    /// Calling `start` on a pool that is already running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("WORKER_POOL: start called while already running");
            return;
        }

        let min_workers = self.autoscaler.policy().min_workers;
        match self.queue.health_check().await {
            Ok(true) => {}
            Ok(false) => warn!("WORKER_POOL: queue backend reported unhealthy"),
            Err(e) => warn!(error = %e, "WORKER_POOL: queue health check failed"),
        }
        let backlog = self
            .queue
            .count(Some(JobStatus::Pending))
            .await
            .unwrap_or(0);
        info!(
            backend = self.queue.backend_name(),
            processor = self.processor.processor_name(),
            min_workers,
            max_workers = self.autoscaler.policy().max_workers,
            pending_jobs = backlog,
            "👷 WORKER_POOL: starting"
        );

        for _ in 0..min_workers {
            self.spawn_worker();
        }
        self.spawn_scaling_loop();
    }

    /// Stop accepting work and wait for in-flight jobs to drain.
    ///
    /// Workers that have not finished within `timeout` are aborted.
    pub async fn shutdown(&self, timeout: Duration) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        info!("🛑 WORKER_POOL: shutting down");
        self.shutdown_notify.notify_waiters();

        let handles: Vec<WorkerHandle> = {
            let mut workers = self.workers.lock();
            workers.drain(..).collect()
        };
        for handle in &handles {
            handle.stop_flag.store(true, Ordering::Release);
        }

        let deadline = Instant::now() + timeout;
        for handle in handles {
            let mut join = handle.join;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, &mut join).await.is_err() {
                warn!(
                    worker_id = handle.worker_id,
                    "WORKER_POOL: worker did not stop within the deadline, aborting"
                );
                join.abort();
            }
        }
        info!("WORKER_POOL: shutdown complete");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn in_flight_jobs(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    /// Snapshot of the signals the autoscaler consumes
    pub async fn engine_state(&self) -> Result<EngineState> {
        let queue_depth = self.queue.count(Some(JobStatus::Pending)).await?;
        Ok(EngineState {
            current_workers: self.worker_count(),
            queue_depth,
            p95_latency_ms: self.latency.p95_ms(),
            in_flight_jobs: self.in_flight_jobs(),
            last_scale_time: *self.last_scale_time.lock(),
        })
    }

    fn spawn_worker(&self) {
        let worker_id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let join = tokio::spawn(Self::worker_loop(
            worker_id,
            Arc::clone(&self.queue),
            Arc::clone(&self.processor),
            Arc::clone(&stop_flag),
            Arc::clone(&self.in_flight),
            Arc::clone(&self.latency),
            self.poll_interval,
        ));
        self.workers.lock().push(WorkerHandle {
            worker_id,
            stop_flag,
            join,
        });
        debug!(worker_id, "WORKER_POOL: worker spawned");
    }

    /// Mark `count` workers for retirement. Each finishes its current job
    /// before exiting.
    fn retire_workers(&self, count: usize) {
        let mut workers = self.workers.lock();
        for _ in 0..count {
            let Some(handle) = workers.pop() else { break };
            handle.stop_flag.store(true, Ordering::Release);
            debug!(
                worker_id = handle.worker_id,
                "WORKER_POOL: worker retiring after current job"
            );
        }
    }

    fn spawn_scaling_loop(self: &Arc<Self>) {
        let weak: Weak<WorkerPool> = Arc::downgrade(self);
        let interval = self.autoscaler.policy().evaluation_interval();
        let shutdown = Arc::clone(&self.shutdown_notify);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let Some(pool) = weak.upgrade() else { break };
                        if !pool.running.load(Ordering::Acquire) {
                            break;
                        }
                        if let Err(e) = pool.scaling_cycle().await {
                            error!(error = %e, "WORKER_POOL: scaling cycle failed");
                        }
                    }
                    _ = shutdown.notified() => {
                        debug!("WORKER_POOL: scaling loop shutting down");
                        break;
                    }
                }
            }
        });
    }

    async fn scaling_cycle(&self) -> Result<()> {
        // Workers only exit on retirement, so a finished handle here means
        // the task died; drop it so the count stays honest
        let pruned = {
            let mut workers = self.workers.lock();
            let before = workers.len();
            workers.retain(|handle| !handle.join.is_finished());
            before - workers.len()
        };
        if pruned > 0 {
            warn!(pruned, "WORKER_POOL: removed workers whose tasks ended unexpectedly");
        }

        let state = self.engine_state().await?;
        let decision = self.autoscaler.decide(&state, Instant::now());

        match decision.direction {
            ScaleDirection::Up => {
                let to_add = decision.desired_workers.saturating_sub(state.current_workers);
                info!(
                    current_workers = state.current_workers,
                    desired_workers = decision.desired_workers,
                    reason = %decision.reason,
                    "🔼 WORKER_POOL: scaling up"
                );
                for _ in 0..to_add {
                    self.spawn_worker();
                }
                *self.last_scale_time.lock() = Some(Instant::now());
            }
            ScaleDirection::Down => {
                let to_remove = state.current_workers.saturating_sub(decision.desired_workers);
                info!(
                    current_workers = state.current_workers,
                    desired_workers = decision.desired_workers,
                    reason = %decision.reason,
                    "🔽 WORKER_POOL: scaling down"
                );
                self.retire_workers(to_remove);
                *self.last_scale_time.lock() = Some(Instant::now());
            }
            ScaleDirection::Hold => {
                debug!(reason = %decision.reason, "WORKER_POOL: holding worker count");
            }
        }
        Ok(())
    }

    async fn worker_loop(
        worker_id: usize,
        queue: Arc<QueueProvider>,
        processor: Arc<dyn JobProcessor>,
        stop_flag: Arc<AtomicBool>,
        in_flight: Arc<AtomicUsize>,
        latency: Arc<LatencyTracker>,
        poll_interval: Duration,
    ) {
        debug!(worker_id, "WORKER: loop started");
        while !stop_flag.load(Ordering::Acquire) {
            match queue.dequeue().await {
                Ok(Some(job)) => {
                    in_flight.fetch_add(1, Ordering::SeqCst);
                    logging::log_queue_operation(
                        "JOB_CLAIMED",
                        Some(&job.id),
                        job.run_id.as_deref(),
                        JobStatus::Running.as_str(),
                        Some(&format!("worker={worker_id}")),
                    );
                    let started = Instant::now();
                    let outcome = processor.process(&job).await;
                    latency.record(started.elapsed());

                    let status = outcome.status;
                    if let Err(e) = queue
                        .update_status(&job.id, outcome.status, outcome.error, outcome.result)
                        .await
                    {
                        logging::log_error(
                            "WorkerPool",
                            "update_status",
                            &e.to_string(),
                            Some(&job.id),
                        );
                        error!(
                            worker_id,
                            job_id = %job.id,
                            error = %e,
                            "WORKER: failed to record job transition"
                        );
                    }
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    logging::log_queue_operation(
                        "JOB_PROCESSED",
                        Some(&job.id),
                        job.run_id.as_deref(),
                        status.as_str(),
                        Some(&format!("worker={worker_id}")),
                    );
                    debug!(
                        worker_id,
                        job_id = %job.id,
                        status = status.as_str(),
                        "WORKER: job processed"
                    );
                }
                Ok(None) => {
                    tokio::time::sleep(poll_interval).await;
                }
                Err(e) => {
                    warn!(worker_id, error = %e, "WORKER: dequeue failed, backing off");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
        debug!(worker_id, "WORKER: loop stopped");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("backend", &self.queue.backend_name())
            .field("workers", &self.worker_count())
            .field("in_flight", &self.in_flight_jobs())
            .field("running", &self.is_running())
            .finish()
    }
}
