//! The worker pool: `N` concurrent loops sharing one process-wide
//! shutdown signal, each owning exactly one in-flight job at a time.
//! State machine: `Idle -> Polling -> Claimed -> Running ->
//! (Succeeded | Failed) -> Idle`, with an absorbing `Stopped` reachable
//! from any state on shutdown. Each loop polls, claims, heartbeats, runs
//! the job's executor, then records the outcome and makes the retry/DLQ
//! decision.

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::executor::{ExecutionContext, Executor};
use crate::job::{Attempt, Job, Status};
use crate::retry::calculate_retry_delay;
use crate::store::JobStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Maps a job's queue name to the executor that should run it, falling
/// back to `"default"` when no queue-specific executor is registered.
/// Queue name is the routing key, since it's the only per-job dispatch
/// field already present in the data model.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, executor: Arc<dyn Executor>) -> &mut Self {
        self.executors.insert(name.into(), executor);
        self
    }

    pub fn resolve(&self, queue: &str) -> Option<Arc<dyn Executor>> {
        self.executors
            .get(queue)
            .or_else(|| self.executors.get("default"))
            .cloned()
    }
}

pub struct WorkerPoolConfig {
    pub pool_id: String,
    pub queues: Vec<String>,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            pool_id: "widad-node".to_string(),
            queues: vec!["default".to_string(), "high".to_string(), "low".to_string()],
            poll_interval: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// Owns the set of running worker tasks and the shutdown signal that stops
/// them. `shutdown().await` closes the signal and waits for every loop to
/// exit — in-flight executors are given the chance to observe
/// cancellation and return before the loop joins.
pub struct WorkerPoolHandle {
    shutdown: CancellationSource,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerPoolHandle {
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

pub struct WorkerPool {
    store: Arc<dyn JobStore>,
    executors: ExecutorRegistry,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(store: Arc<dyn JobStore>, executors: ExecutorRegistry, config: WorkerPoolConfig) -> Self {
        Self {
            store,
            executors,
            config,
        }
    }

    /// Spawns `num_workers` loops named `<pool-id>-<index>`.
    pub fn start(self, num_workers: usize) -> WorkerPoolHandle {
        tracing::info!(pool_id = %self.config.pool_id, num_workers, "starting worker pool");
        let (shutdown_source, shutdown) = CancellationSource::new();

        let store = self.store;
        let executors = Arc::new(self.executors);
        let queues = Arc::new(self.config.queues);
        let poll_interval = self.config.poll_interval;
        let heartbeat_interval = self.config.heartbeat_interval;

        let mut tasks = Vec::with_capacity(num_workers);
        for index in 0..num_workers {
            let worker_id = format!("{}-{}", self.config.pool_id, index);
            let store = store.clone();
            let executors = executors.clone();
            let queues = queues.clone();
            let shutdown = shutdown.clone();

            tasks.push(tokio::spawn(run_worker_loop(
                worker_id,
                store,
                executors,
                queues,
                poll_interval,
                heartbeat_interval,
                shutdown,
            )));
        }

        WorkerPoolHandle {
            shutdown: shutdown_source,
            tasks,
        }
    }
}

async fn run_worker_loop(
    worker_id: String,
    store: Arc<dyn JobStore>,
    executors: Arc<ExecutorRegistry>,
    queues: Arc<Vec<String>>,
    poll_interval: Duration,
    heartbeat_interval: Duration,
    shutdown: CancellationToken,
) {
    if let Err(err) = store.register_worker(&worker_id).await {
        tracing::error!(%worker_id, error = %err, "failed to register worker");
        return;
    }

    let mut tick = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!(%worker_id, "worker shutting down");
                return;
            }
            _ = tick.tick() => {
                match store.dequeue(&queues, &worker_id).await {
                    Ok(Some(job)) => {
                        process_job(&worker_id, &store, &executors, job, heartbeat_interval, shutdown.clone()).await;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(%worker_id, error = %err, "dequeue failed, will retry next tick");
                    }
                }
            }
        }
    }
}

async fn process_job(
    worker_id: &str,
    store: &Arc<dyn JobStore>,
    executors: &Arc<ExecutorRegistry>,
    job: Job,
    heartbeat_interval: Duration,
    shutdown: CancellationToken,
) {
    tracing::info!(%worker_id, job_id = %job.id, queue = %job.queue, "claimed job");

    if let Err(err) = store
        .update_worker_status(worker_id, "running", Some(job.id.as_str()))
        .await
    {
        tracing::warn!(%worker_id, error = %err, "failed to mark worker running");
    }

    let (job_cancel_source, job_cancel) = CancellationSource::new();
    let heartbeat_task = spawn_heartbeat(store.clone(), job.id.clone(), worker_id.to_string(), heartbeat_interval, job_cancel.clone());

    let executor = executors.resolve(&job.queue);
    let attempt = run_attempt(executor, &job, &job_cancel_source, job_cancel.clone(), shutdown.clone()).await;

    job_cancel_source.cancel();
    let _ = heartbeat_task.await;

    record_outcome(store, job, attempt).await;

    if let Err(err) = store.update_worker_status(worker_id, "idle", None).await {
        tracing::warn!(%worker_id, error = %err, "failed to mark worker idle");
    }
    if let Err(err) = store.increment_worker_jobs(worker_id).await {
        tracing::warn!(%worker_id, error = %err, "failed to increment worker job counter");
    }
}

/// Runs the executor to completion, bounded by the job's per-attempt
/// timeout and the pool-wide shutdown signal. Neither bound force-aborts
/// the executor: cancellation is signalled through the context and the
/// attempt completes once the executor observes it and returns promptly.
async fn run_attempt(
    executor: Option<Arc<dyn Executor>>,
    job: &Job,
    job_cancel_source: &CancellationSource,
    job_cancel: CancellationToken,
    shutdown: CancellationToken,
) -> Attempt {
    let started_at = Utc::now();
    let mut attempt = Attempt::started(started_at);

    let Some(executor) = executor else {
        attempt.finish(
            Utc::now(),
            Status::Failed,
            Some(format!("no executor registered for queue {:?}", job.queue)),
        );
        return attempt;
    };

    let ctx = ExecutionContext::new(job_cancel);
    let job_owned = job.clone();
    let mut task = tokio::spawn(async move { executor.execute(&ctx, &job_owned).await });

    let outcome = if job.timeout.is_zero() {
        tokio::select! {
            res = &mut task => res,
            _ = shutdown.cancelled() => {
                job_cancel_source.cancel();
                (&mut task).await
            }
        }
    } else {
        tokio::select! {
            res = &mut task => res,
            _ = tokio::time::sleep(job.timeout) => {
                job_cancel_source.cancel();
                (&mut task).await
            }
            _ = shutdown.cancelled() => {
                job_cancel_source.cancel();
                (&mut task).await
            }
        }
    };

    let finished_at = Utc::now();
    match outcome {
        Ok(Ok(())) => attempt.finish(finished_at, Status::Success, None),
        Ok(Err(err)) => attempt.finish(finished_at, Status::Failed, Some(err.to_string())),
        Err(join_err) => attempt.finish(finished_at, Status::Failed, Some(join_err.to_string())),
    }

    attempt
}

async fn record_outcome(store: &Arc<dyn JobStore>, job: Job, attempt: Attempt) {
    let attempt_count = job.attempts.len() as i32 + 1;

    match attempt.status {
        Status::Success => {
            if let Err(err) = store
                .update_status(&job.id, Status::Success, attempt, None)
                .await
            {
                tracing::error!(job_id = %job.id, error = %err, "failed to record success");
            }
            tracing::info!(job_id = %job.id, "job succeeded");
        }
        Status::Failed => {
            let error_message = attempt.error.clone().unwrap_or_default();

            if attempt_count >= job.max_retries {
                tracing::warn!(job_id = %job.id, attempt_count, max_retries = job.max_retries, "retries exhausted, moving to dead-letter queue");
                if let Err(err) = store.update_status(&job.id, Status::Failed, attempt, None).await {
                    tracing::error!(job_id = %job.id, error = %err, "failed to record final attempt before DLQ move");
                }
                if let Err(err) = store.move_to_dlq(&job.id, &error_message).await {
                    tracing::error!(job_id = %job.id, error = %err, "failed to move job to dead-letter queue");
                }
            } else {
                let delay = calculate_retry_delay(attempt_count, &job.retry_policy);
                let next_run_at = Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
                tracing::info!(job_id = %job.id, attempt_count, ?delay, "job failed, scheduling retry");
                if let Err(err) = store
                    .update_status(&job.id, Status::Pending, attempt, Some(next_run_at))
                    .await
                {
                    tracing::error!(job_id = %job.id, error = %err, "failed to reschedule job after failure");
                }
            }
        }
        _ => unreachable!("run_attempt only produces terminal Success/Failed attempts"),
    }
}

async fn spawn_heartbeat(
    store: Arc<dyn JobStore>,
    job_id: String,
    worker_id: String,
    interval: Duration,
    job_cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.tick().await; // first tick fires immediately; skip it, the claim already stamped last_heartbeat
        loop {
            tokio::select! {
                _ = job_cancel.cancelled() => return,
                _ = tick.tick() => {
                    if let Err(err) = store.heartbeat(&job_id, &worker_id).await {
                        tracing::warn!(%job_id, %worker_id, error = %err, "heartbeat failed");
                    }
                }
            }
        }
    })
}
