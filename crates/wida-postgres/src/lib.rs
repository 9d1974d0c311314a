//! PostgreSQL-backed implementation of `wida_core::JobStore`.
//!
//! # Features
//!
//! - Atomic claim via `FOR UPDATE SKIP LOCKED`
//! - Exponential backoff retry scheduling, persisted transactionally with
//!   the attempt that triggered it
//! - Dead-letter queue for permanently failed jobs
//! - Worker heartbeats and stale-lease reclamation
//! - Cron template materialisation with an idempotent per-tick cursor
//!
//! # Database Schema
//!
//! See `schema.sql` in this crate for the full `wida_jobs` / `wida_dlq` /
//! `wida_workers` definitions.
//!
//! # Usage
//!
//! ```rust,ignore
//! use wida_postgres::PgJobStore;
//! use sqlx::PgPool;
//!
//! let pool = PgPool::connect("postgres://localhost/wida").await?;
//! let store = PgJobStore::new(pool);
//! ```

mod leader;
mod row;

pub use leader::PgLeaderElection;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use row::JobRow;
use sqlx::{PgPool, Row};
use wida_core::{
    job::{Attempt, DlqEntry, Job, WorkerStats},
    store::{JobFilter, JobStore, StoreError, StoreResult},
    Status,
};

fn transient(err: sqlx::Error) -> StoreError {
    StoreError::Transient(err.into())
}

fn status_str(status: Status) -> &'static str {
    match status {
        Status::Pending => "pending",
        Status::Running => "running",
        Status::Success => "success",
        Status::Failed => "failed",
        Status::Dead => "dead",
    }
}

/// PostgreSQL job store. Cheap to clone; wraps a pooled `PgPool`.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn enqueue(&self, mut job: Job) -> StoreResult<Job> {
        job.seed_cron_next_run(Utc::now());

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO wida_jobs (
                id, queue, payload, status, run_at, cron_expr, cron_next_run,
                retry_policy, timeout_ms, max_retries, attempts, dependencies,
                dependents, worker_id, last_heartbeat, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(&job.id)
        .bind(&job.queue)
        .bind(&job.payload)
        .bind(status_str(job.status))
        .bind(job.run_at)
        .bind(&job.cron_expr)
        .bind(job.cron_next_run)
        .bind(sqlx::types::Json(&job.retry_policy))
        .bind(job.timeout.as_millis() as i64)
        .bind(job.max_retries)
        .bind(sqlx::types::Json(&job.attempts))
        .bind(sqlx::types::Json(&job.dependencies))
        .bind(sqlx::types::Json(&job.dependents))
        .bind(&job.worker_id)
        .bind(job.last_heartbeat)
        .bind(job.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Constraint(format!("job {} already exists", job.id))
            }
            _ => transient(err),
        })?;

        row.try_into_job().map_err(StoreError::Transient)
    }

    async fn dequeue(&self, queues: &[String], worker_id: &str) -> StoreResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            WITH claimable AS (
                SELECT id
                FROM wida_jobs
                WHERE status = 'pending'
                  AND queue = ANY($1)
                  AND (run_at IS NULL OR run_at <= NOW())
                  AND jsonb_array_length(dependencies) = 0
                ORDER BY run_at NULLS FIRST, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE wida_jobs
            SET status = 'running',
                worker_id = $2,
                last_heartbeat = NOW()
            WHERE id IN (SELECT id FROM claimable)
            RETURNING *
            "#,
        )
        .bind(queues)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(transient)?;

        row.map(|r| r.try_into_job().map_err(StoreError::Transient))
            .transpose()
    }

    async fn heartbeat(&self, job_id: &str, worker_id: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE wida_jobs
            SET last_heartbeat = NOW()
            WHERE id = $1 AND worker_id = $2 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(transient)?;

        Ok(())
    }

    async fn update_status(
        &self,
        job_id: &str,
        new_status: Status,
        attempt: Attempt,
        new_run_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(transient)?;

        let existing: (sqlx::types::Json<Vec<Attempt>>,) =
            sqlx::query_as("SELECT attempts FROM wida_jobs WHERE id = $1 FOR UPDATE")
                .bind(job_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(transient)?
                .ok_or(StoreError::NotFound)?;

        let mut attempts = existing.0 .0;
        attempts.push(attempt);

        let still_running = matches!(new_status, Status::Running);

        sqlx::query(
            r#"
            UPDATE wida_jobs
            SET status = $2,
                attempts = $3,
                run_at = COALESCE($4, run_at),
                worker_id = CASE WHEN $5 THEN worker_id ELSE NULL END,
                last_heartbeat = CASE WHEN $5 THEN last_heartbeat ELSE NULL END
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(status_str(new_status))
        .bind(sqlx::types::Json(&attempts))
        .bind(new_run_at)
        .bind(still_running)
        .execute(&mut *tx)
        .await
        .map_err(transient)?;

        tx.commit().await.map_err(transient)?;
        Ok(())
    }

    async fn move_to_dlq(&self, job_id: &str, reason: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(transient)?;

        let row = sqlx::query(
            "SELECT queue, payload, attempts FROM wida_jobs WHERE id = $1 FOR UPDATE",
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(transient)?
        .ok_or(StoreError::NotFound)?;

        let queue: String = row.get("queue");
        let payload: serde_json::Value = row.get("payload");
        let attempts: sqlx::types::Json<Vec<Attempt>> = row.get("attempts");

        sqlx::query(
            r#"
            INSERT INTO wida_dlq (id, queue, payload, reason, attempts, failed_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(job_id)
        .bind(&queue)
        .bind(&payload)
        .bind(reason)
        .bind(attempts)
        .execute(&mut *tx)
        .await
        .map_err(transient)?;

        sqlx::query("DELETE FROM wida_jobs WHERE id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(transient)?;

        tx.commit().await.map_err(transient)?;
        Ok(())
    }

    async fn get_job(&self, id: &str) -> StoreResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM wida_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(transient)?;

        row.map(|r| r.try_into_job().map_err(StoreError::Transient))
            .transpose()
    }

    async fn list_jobs(&self, filter: &JobFilter, limit: i64, offset: i64) -> StoreResult<Vec<Job>> {
        let status = filter.status.map(status_str);
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM wida_jobs
            WHERE ($1::text IS NULL OR queue = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&filter.queue)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(transient)?;

        rows.into_iter()
            .map(|r| r.try_into_job().map_err(StoreError::Transient))
            .collect()
    }

    async fn list_dlq(&self, limit: i64, offset: i64) -> StoreResult<Vec<DlqEntry>> {
        let rows = sqlx::query(
            "SELECT id, queue, payload, reason, attempts, failed_at FROM wida_dlq ORDER BY failed_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(transient)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let attempts: sqlx::types::Json<Vec<Attempt>> = row.get("attempts");
                DlqEntry {
                    id: row.get("id"),
                    queue: row.get("queue"),
                    payload: row.get("payload"),
                    reason: row.get("reason"),
                    attempts: attempts.0,
                    failed_at: row.get("failed_at"),
                }
            })
            .collect())
    }

    async fn list_workers(&self) -> StoreResult<Vec<WorkerStats>> {
        let rows = sqlx::query(
            "SELECT id, status, current_job_id, jobs_completed, last_heartbeat FROM wida_workers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(transient)?;

        Ok(rows
            .into_iter()
            .map(|row| WorkerStats {
                id: row.get("id"),
                status: row.get("status"),
                current_job_id: row.get("current_job_id"),
                jobs_completed: row.get("jobs_completed"),
                last_heartbeat: row.get("last_heartbeat"),
            })
            .collect())
    }

    async fn register_worker(&self, id: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wida_workers (id, status, last_heartbeat)
            VALUES ($1, 'idle', NOW())
            ON CONFLICT (id) DO UPDATE SET status = 'idle', last_heartbeat = NOW()
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(transient)?;

        Ok(())
    }

    async fn update_worker_status(
        &self,
        id: &str,
        status: &str,
        current_job_id: Option<&str>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE wida_workers
            SET status = $2, current_job_id = $3, last_heartbeat = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(current_job_id)
        .execute(&self.pool)
        .await
        .map_err(transient)?;

        Ok(())
    }

    async fn increment_worker_jobs(&self, id: &str) -> StoreResult<()> {
        sqlx::query("UPDATE wida_workers SET jobs_completed = jobs_completed + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(transient)?;

        Ok(())
    }

    async fn release_satisfied_dependents(&self) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE wida_jobs w1
            SET dependencies = '[]'::jsonb
            WHERE status = 'pending'
              AND jsonb_array_length(dependencies) > 0
              AND NOT EXISTS (
                  SELECT 1
                  FROM jsonb_array_elements_text(w1.dependencies) dep(id)
                  LEFT JOIN wida_jobs w2 ON w2.id = dep.id
                  WHERE w2.id IS NULL OR w2.status != 'success'
              )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(transient)?;

        Ok(result.rows_affected())
    }

    async fn reclaim_expired(&self, lease_timeout: chrono::Duration) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE wida_jobs
            SET status = 'pending',
                worker_id = NULL,
                last_heartbeat = NULL
            WHERE status = 'running'
              AND last_heartbeat < NOW() - ($1 * INTERVAL '1 second')
            "#,
        )
        .bind(lease_timeout.num_seconds() as f64)
        .execute(&self.pool)
        .await
        .map_err(transient)?;

        Ok(result.rows_affected())
    }

    async fn list_due_cron_templates(&self, now: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM wida_jobs WHERE cron_expr IS NOT NULL AND cron_next_run <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(transient)?;

        rows.into_iter()
            .map(|r| r.try_into_job().map_err(StoreError::Transient))
            .collect()
    }

    async fn fire_cron_template(
        &self,
        template_id: &str,
        instance: Job,
        next_run: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(transient)?;

        sqlx::query(
            r#"
            INSERT INTO wida_jobs (
                id, queue, payload, status, run_at, cron_expr, cron_next_run,
                retry_policy, timeout_ms, max_retries, attempts, dependencies,
                dependents, worker_id, last_heartbeat, created_at
            )
            VALUES ($1, $2, $3, $4, $5, NULL, NULL, $6, $7, $8, $9, $10, $11, NULL, NULL, $12)
            "#,
        )
        .bind(&instance.id)
        .bind(&instance.queue)
        .bind(&instance.payload)
        .bind(status_str(instance.status))
        .bind(instance.run_at)
        .bind(sqlx::types::Json(&instance.retry_policy))
        .bind(instance.timeout.as_millis() as i64)
        .bind(instance.max_retries)
        .bind(sqlx::types::Json(&instance.attempts))
        .bind(sqlx::types::Json(&instance.dependencies))
        .bind(sqlx::types::Json(&instance.dependents))
        .bind(instance.created_at)
        .execute(&mut *tx)
        .await
        .map_err(transient)?;

        sqlx::query("UPDATE wida_jobs SET cron_next_run = $1 WHERE id = $2")
            .bind(next_run)
            .bind(template_id)
            .execute(&mut *tx)
            .await
            .map_err(transient)?;

        tx.commit().await.map_err(transient)?;
        Ok(())
    }
}
