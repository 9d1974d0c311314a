//! Domain types shared by every component of the queue: the job record
//! itself, its execution history, worker bookkeeping, and the dead-letter
//! shape jobs take once retries are exhausted.

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Lifecycle state of a [`Job`]. Serializes lowercase to match the
/// `wida_jobs.status` column domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Running,
    Success,
    Failed,
    Dead,
}

/// One execution of a job, terminal once `finished_at` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: Status,
    pub error: Option<String>,
}

impl Attempt {
    pub fn started(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            finished_at: None,
            status: Status::Running,
            error: None,
        }
    }

    pub fn finish(&mut self, now: DateTime<Utc>, status: Status, error: Option<String>) {
        self.finished_at = Some(now);
        self.status = status;
        self.error = error;
    }
}

/// Exponential backoff parameters for a job's retries. See
/// [`crate::retry::calculate_retry_delay`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(with = "duration_millis")]
    pub initial_interval: Duration,
    #[serde(with = "duration_millis")]
    pub max_interval: Duration,
    pub max_attempts: i32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(3600),
            max_attempts: 5,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.as_millis() as i64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = i64::deserialize(d)?;
        Ok(Duration::from_millis(millis.max(0) as u64))
    }
}

/// A persisted unit of work. Identity is the opaque string `id`; `payload`
/// is never interpreted by the core, only passed through to an
/// [`crate::executor::Executor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub queue: String,
    pub payload: serde_json::Value,
    pub status: Status,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub run_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cron_expr: Option<String>,
    /// Next materialisation time for a cron template job. `None` for
    /// ordinary (non-recurring) jobs. Advanced atomically alongside the
    /// instance insert so overlapping scheduler ticks cannot double-fire.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cron_next_run: Option<DateTime<Utc>>,
    pub retry_policy: RetryPolicy,

    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    pub max_retries: i32,
    pub attempts: Vec<Attempt>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dependents: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub worker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Builds a new, `pending` job with sane defaults; callers override the
    /// fields they care about (queue, payload, policy, dependencies, ...).
    pub fn new(id: impl Into<String>, queue: impl Into<String>, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            queue: queue.into(),
            payload,
            status: Status::Pending,
            run_at: None,
            cron_expr: None,
            cron_next_run: None,
            retry_policy: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
            max_retries: 5,
            attempts: Vec::new(),
            dependencies: Vec::new(),
            dependents: Vec::new(),
            worker_id: None,
            last_heartbeat: None,
            created_at: now,
        }
    }

    /// True iff `dependencies` is empty — the gate the scheduler clears
    /// once every predecessor has reached `success`.
    pub fn is_dag_unblocked(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Seeds `cron_next_run` from `cron_expr` for a freshly-created
    /// template. A no-op if `cron_next_run` is already set, if there is no
    /// `cron_expr`, or if `cron_expr` doesn't parse — without this, a
    /// template enqueued with a cursor of `None` (the default `Job::new`
    /// and HTTP-enqueue produce) would never satisfy
    /// `list_due_cron_templates`'s `cron_next_run <= now` and would sit
    /// invisible forever, since the scheduler only ever advances an
    /// already-set cursor.
    pub fn seed_cron_next_run(&mut self, now: DateTime<Utc>) {
        if self.cron_next_run.is_some() {
            return;
        }
        let Some(expr) = self.cron_expr.as_deref() else {
            return;
        };
        if let Ok(schedule) = Schedule::from_str(expr) {
            self.cron_next_run = schedule.after(&now).next();
        }
    }
}

/// A worker process's self-reported liveness and throughput.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStats {
    pub id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_job_id: Option<String>,
    pub jobs_completed: i64,
    pub last_heartbeat: DateTime<Utc>,
}

/// A job that exhausted its retries, moved atomically out of the live
/// jobs table and into the dead-letter sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub id: String,
    pub queue: String,
    pub payload: serde_json::Value,
    pub reason: String,
    pub attempts: Vec<Attempt>,
    pub failed_at: DateTime<Utc>,
}
