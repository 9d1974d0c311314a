//! The `JobStore` trait: the single abstraction every other component
//! (worker pool, scheduler, HTTP surface) is written against. A SQL-backed
//! implementation is canonical (`wida-postgres`), but the contract only
//! requires atomic conditional updates and a transactional two-row move —
//! see `wida-testing::InMemoryJobStore` for a non-SQL implementation that
//! satisfies it.

use crate::job::{Attempt, DlqEntry, Job, Status, WorkerStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error kinds surfaced by a [`JobStore`]. `NotFound` is expected and
/// handled by callers (e.g. `Dequeue` returning nothing); the others are
/// genuine failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transient store error: {0}")]
    Transient(#[source] anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("constraint violation: {0}")]
    Constraint(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Optional filter for [`JobStore::list_jobs`]; all fields are AND'd
/// together when present.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub queue: Option<String>,
    pub status: Option<Status>,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persists `job` with its declared status (defaulting to `pending`).
    /// Fails with [`StoreError::Constraint`] on a duplicate id.
    async fn enqueue(&self, job: Job) -> StoreResult<Job>;

    /// Atomically claims at most one eligible job from `queues` for
    /// `worker_id`. Ordered ascending by `run_at` (nulls first), tie-broken
    /// by `created_at` ascending. Never returns the same job to two
    /// callers; returns `Ok(None)` when nothing is eligible.
    async fn dequeue(&self, queues: &[String], worker_id: &str) -> StoreResult<Option<Job>>;

    /// Refreshes `last_heartbeat` iff the job is still `running` and still
    /// owned by `worker_id`. A no-op (not an error) if the worker has been
    /// displaced or the job has ended.
    async fn heartbeat(&self, job_id: &str, worker_id: &str) -> StoreResult<()>;

    /// Appends `attempt` and sets `status` in one transaction. When
    /// `new_run_at` is supplied (a reschedule-to-pending transition), it is
    /// persisted in the same transaction so a reschedule can never be
    /// observed with a stale `run_at`.
    async fn update_status(
        &self,
        job_id: &str,
        new_status: Status,
        attempt: Attempt,
        new_run_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// Moves a job into the dead-letter sink: read `(queue, payload,
    /// attempts)`, insert the DLQ row stamped `failed_at = now`, delete the
    /// job row — all in one transaction.
    async fn move_to_dlq(&self, job_id: &str, reason: &str) -> StoreResult<()>;

    async fn get_job(&self, id: &str) -> StoreResult<Option<Job>>;

    /// Paginated, ordered by `created_at` descending.
    async fn list_jobs(&self, filter: &JobFilter, limit: i64, offset: i64) -> StoreResult<Vec<Job>>;

    /// Paginated, ordered by `failed_at` descending.
    async fn list_dlq(&self, limit: i64, offset: i64) -> StoreResult<Vec<DlqEntry>>;

    async fn list_workers(&self) -> StoreResult<Vec<WorkerStats>>;

    /// Upserts a worker row as `alive` with a fresh heartbeat.
    async fn register_worker(&self, id: &str) -> StoreResult<()>;

    /// Empty `current_job_id` is stored as absent.
    async fn update_worker_status(
        &self,
        id: &str,
        status: &str,
        current_job_id: Option<&str>,
    ) -> StoreResult<()>;

    async fn increment_worker_jobs(&self, id: &str) -> StoreResult<()>;

    /// Clears `dependencies` on every `pending` job whose predecessors have
    /// all reached `success`. Returns the number of jobs advanced.
    async fn release_satisfied_dependents(&self) -> StoreResult<u64>;

    /// Reclaims jobs whose lease (`last_heartbeat`) has gone stale —
    /// presumably because their worker crashed mid-execution — back to
    /// `pending` with a fresh `run_at`. Returns the number of jobs
    /// reclaimed.
    async fn reclaim_expired(&self, lease_timeout: chrono::Duration) -> StoreResult<u64>;

    /// Cron template jobs (`cron_expr.is_some()`) whose `cron_next_run` is
    /// due at or before `now`.
    async fn list_due_cron_templates(&self, now: DateTime<Utc>) -> StoreResult<Vec<Job>>;

    /// Atomically inserts `instance` and advances `template_id`'s
    /// `cron_next_run` to `next_run` in one transaction, so a template
    /// fired by one scheduler tick cannot be picked up again by an
    /// overlapping tick before its cursor moves.
    async fn fire_cron_template(
        &self,
        template_id: &str,
        instance: Job,
        next_run: DateTime<Utc>,
    ) -> StoreResult<()>;
}
