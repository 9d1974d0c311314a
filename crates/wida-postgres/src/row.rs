use chrono::{DateTime, Utc};
use sqlx::types::Json;
use wida_core::job::{Attempt, Job, RetryPolicy, Status};

/// Maps a `wida_jobs` row onto the wire-agnostic [`Job`] domain type.
/// Kept separate from `Job` itself so the domain type never has to derive
/// `sqlx::FromRow` or know about JSONB wrapping.
#[derive(sqlx::FromRow)]
pub struct JobRow {
    pub id: String,
    pub queue: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub run_at: Option<DateTime<Utc>>,
    pub cron_expr: Option<String>,
    pub cron_next_run: Option<DateTime<Utc>>,
    pub retry_policy: Json<RetryPolicy>,
    pub timeout_ms: i64,
    pub max_retries: i32,
    pub attempts: Json<Vec<Attempt>>,
    pub dependencies: Json<Vec<String>>,
    pub dependents: Json<Vec<String>>,
    pub worker_id: Option<String>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl JobRow {
    pub fn try_into_job(self) -> anyhow::Result<Job> {
        let status = match self.status.as_str() {
            "pending" => Status::Pending,
            "running" => Status::Running,
            "success" => Status::Success,
            "failed" => Status::Failed,
            "dead" => Status::Dead,
            other => anyhow::bail!("unknown job status {other:?}"),
        };

        Ok(Job {
            id: self.id,
            queue: self.queue,
            payload: self.payload,
            status,
            run_at: self.run_at,
            cron_expr: self.cron_expr,
            cron_next_run: self.cron_next_run,
            retry_policy: self.retry_policy.0,
            timeout: std::time::Duration::from_millis(self.timeout_ms.max(0) as u64),
            max_retries: self.max_retries,
            attempts: self.attempts.0,
            dependencies: self.dependencies.0,
            dependents: self.dependents.0,
            worker_id: self.worker_id,
            last_heartbeat: self.last_heartbeat,
            created_at: self.created_at,
        })
    }
}
