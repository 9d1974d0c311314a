//! An in-memory `JobStore` satisfying the same atomicity contract as
//! `wida-postgres::PgJobStore` without a database: one `claim_lock` mutex
//! serializes the read-select-update sequence `dequeue` otherwise gets
//! from `FOR UPDATE SKIP LOCKED`, so concurrent callers still never
//! observe the same job claimed twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use wida_core::job::{Attempt, DlqEntry, Job, Status, WorkerStats};
use wida_core::store::{JobFilter, JobStore, StoreError, StoreResult};

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<String, Job>,
    dlq: DashMap<String, DlqEntry>,
    workers: DashMap<String, WorkerStats>,
    claim_lock: AsyncMutex<()>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn eligible(job: &Job, queues: &[String], now: DateTime<Utc>) -> bool {
    job.status == Status::Pending
        && queues.iter().any(|q| q == &job.queue)
        && job.run_at.map(|run_at| run_at <= now).unwrap_or(true)
        && job.is_dag_unblocked()
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, mut job: Job) -> StoreResult<Job> {
        if self.jobs.contains_key(&job.id) {
            return Err(StoreError::Constraint(format!("job {} already exists", job.id)));
        }
        job.seed_cron_next_run(Utc::now());
        self.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn dequeue(&self, queues: &[String], worker_id: &str) -> StoreResult<Option<Job>> {
        let _guard = self.claim_lock.lock().await;
        let now = Utc::now();

        let candidate_id = self
            .jobs
            .iter()
            .filter(|entry| eligible(entry.value(), queues, now))
            .min_by(|a, b| {
                let ra = a.value().run_at;
                let rb = b.value().run_at;
                ra.cmp(&rb).then(a.value().created_at.cmp(&b.value().created_at))
            })
            .map(|entry| entry.key().clone());

        let Some(id) = candidate_id else {
            return Ok(None);
        };

        let mut entry = self.jobs.get_mut(&id).expect("candidate just selected under claim_lock");
        entry.status = Status::Running;
        entry.worker_id = Some(worker_id.to_string());
        entry.last_heartbeat = Some(now);
        Ok(Some(entry.value().clone()))
    }

    async fn heartbeat(&self, job_id: &str, worker_id: &str) -> StoreResult<()> {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            if job.status == Status::Running && job.worker_id.as_deref() == Some(worker_id) {
                job.last_heartbeat = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn update_status(
        &self,
        job_id: &str,
        new_status: Status,
        attempt: Attempt,
        new_run_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut job = self.jobs.get_mut(job_id).ok_or(StoreError::NotFound)?;
        job.attempts.push(attempt);
        job.status = new_status;
        if let Some(run_at) = new_run_at {
            job.run_at = Some(run_at);
        }
        if new_status != Status::Running {
            job.worker_id = None;
            job.last_heartbeat = None;
        }
        Ok(())
    }

    async fn move_to_dlq(&self, job_id: &str, reason: &str) -> StoreResult<()> {
        let (_, job) = self.jobs.remove(job_id).ok_or(StoreError::NotFound)?;
        self.dlq.insert(
            job_id.to_string(),
            DlqEntry {
                id: job.id,
                queue: job.queue,
                payload: job.payload,
                reason: reason.to_string(),
                attempts: job.attempts,
                failed_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_job(&self, id: &str) -> StoreResult<Option<Job>> {
        Ok(self.jobs.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_jobs(&self, filter: &JobFilter, limit: i64, offset: i64) -> StoreResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|job| filter.queue.as_ref().map(|q| q == &job.queue).unwrap_or(true))
            .filter(|job| filter.status.map(|s| s == job.status).unwrap_or(true))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(jobs, limit, offset))
    }

    async fn list_dlq(&self, limit: i64, offset: i64) -> StoreResult<Vec<DlqEntry>> {
        let mut entries: Vec<DlqEntry> = self.dlq.iter().map(|entry| entry.value().clone()).collect();
        entries.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));
        Ok(paginate(entries, limit, offset))
    }

    async fn list_workers(&self) -> StoreResult<Vec<WorkerStats>> {
        let mut workers: Vec<WorkerStats> = self.workers.iter().map(|entry| entry.value().clone()).collect();
        workers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(workers)
    }

    async fn register_worker(&self, id: &str) -> StoreResult<()> {
        self.workers
            .entry(id.to_string())
            .and_modify(|worker| {
                worker.status = "idle".to_string();
                worker.last_heartbeat = Utc::now();
            })
            .or_insert_with(|| WorkerStats {
                id: id.to_string(),
                status: "idle".to_string(),
                current_job_id: None,
                jobs_completed: 0,
                last_heartbeat: Utc::now(),
            });
        Ok(())
    }

    async fn update_worker_status(
        &self,
        id: &str,
        status: &str,
        current_job_id: Option<&str>,
    ) -> StoreResult<()> {
        if let Some(mut worker) = self.workers.get_mut(id) {
            worker.status = status.to_string();
            worker.current_job_id = current_job_id.map(str::to_string);
            worker.last_heartbeat = Utc::now();
        }
        Ok(())
    }

    async fn increment_worker_jobs(&self, id: &str) -> StoreResult<()> {
        if let Some(mut worker) = self.workers.get_mut(id) {
            worker.jobs_completed += 1;
        }
        Ok(())
    }

    async fn release_satisfied_dependents(&self) -> StoreResult<u64> {
        let to_release: Vec<String> = self
            .jobs
            .iter()
            .filter(|entry| {
                let job = entry.value();
                job.status == Status::Pending
                    && !job.dependencies.is_empty()
                    && job.dependencies.iter().all(|dep_id| {
                        self.jobs
                            .get(dep_id)
                            .map(|dep| dep.status == Status::Success)
                            .unwrap_or(false)
                    })
            })
            .map(|entry| entry.key().clone())
            .collect();

        for id in &to_release {
            if let Some(mut job) = self.jobs.get_mut(id) {
                job.dependencies.clear();
            }
        }
        Ok(to_release.len() as u64)
    }

    async fn reclaim_expired(&self, lease_timeout: chrono::Duration) -> StoreResult<u64> {
        let now = Utc::now();
        let mut reclaimed = 0u64;
        for mut entry in self.jobs.iter_mut() {
            let job = entry.value_mut();
            if job.status != Status::Running {
                continue;
            }
            let Some(last_heartbeat) = job.last_heartbeat else {
                continue;
            };
            if now - last_heartbeat > lease_timeout {
                job.status = Status::Pending;
                job.worker_id = None;
                job.last_heartbeat = None;
                job.run_at = Some(now);
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    async fn list_due_cron_templates(&self, now: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        Ok(self
            .jobs
            .iter()
            .filter(|entry| {
                let job = entry.value();
                job.cron_expr.is_some() && job.cron_next_run.map(|next| next <= now).unwrap_or(false)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn fire_cron_template(
        &self,
        template_id: &str,
        instance: Job,
        next_run: DateTime<Utc>,
    ) -> StoreResult<()> {
        if self.jobs.contains_key(&instance.id) {
            return Err(StoreError::Constraint(format!(
                "cron instance {} already exists",
                instance.id
            )));
        }
        self.jobs.insert(instance.id.clone(), instance);

        let mut template = self.jobs.get_mut(template_id).ok_or(StoreError::NotFound)?;
        template.cron_next_run = Some(next_run);
        Ok(())
    }
}

fn paginate<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = offset.max(0) as usize;
    let limit = limit.max(0) as usize;
    items.into_iter().skip(offset).take(limit).collect()
}
