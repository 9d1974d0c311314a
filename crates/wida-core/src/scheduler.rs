//! The cluster-wide scheduler: one nested pair of loops per process, only
//! one of which is ever active cluster-wide at a time. The outer loop
//! contends for leadership every 5s; the inner loop, which only the
//! current leader runs, evaluates cron templates and DAG-gated
//! dependents every 10s. Cron next-fire computation is handled by the
//! `cron` crate.

use crate::cancellation::CancellationToken;
use crate::job::Job;
use crate::leader::LeaderElection;
use crate::store::JobStore;
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub struct SchedulerConfig {
    pub election_interval: Duration,
    pub evaluation_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            election_interval: Duration::from_secs(5),
            evaluation_interval: Duration::from_secs(10),
        }
    }
}

pub struct Scheduler {
    store: Arc<dyn JobStore>,
    election: Arc<dyn LeaderElection>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(store: Arc<dyn JobStore>, election: Arc<dyn LeaderElection>, config: SchedulerConfig) -> Self {
        Self {
            store,
            election,
            config,
        }
    }

    /// Runs until `shutdown` fires. Intended to be spawned as its own
    /// task; a node that never wins the election sits in the outer loop
    /// doing nothing but the periodic `try_acquire` check.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut election_tick = tokio::time::interval(self.config.election_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    if self.election.is_leader() {
                        let _ = self.election.release().await;
                    }
                    return;
                }
                _ = election_tick.tick() => {
                    match self.election.try_acquire().await {
                        Ok(true) => {
                            tracing::info!("acquired scheduler leadership");
                            self.run_as_leader(shutdown.clone()).await;
                        }
                        Ok(false) => {}
                        Err(err) => {
                            tracing::warn!(error = %err, "leadership contention failed, retrying next tick");
                        }
                    }
                }
            }
        }
    }

    /// Runs the evaluation loop until shutdown or until leadership is
    /// lost (the election primitive itself — e.g. connection drop —
    /// decides that; this loop just stops evaluating and returns to the
    /// outer contention loop).
    async fn run_as_leader(&self, shutdown: CancellationToken) {
        let mut eval_tick = tokio::time::interval(self.config.evaluation_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = self.election.release().await;
                    return;
                }
                _ = eval_tick.tick() => {
                    if !self.election.is_leader() {
                        tracing::warn!("lost scheduler leadership, stepping down");
                        return;
                    }
                    self.evaluate_cron().await;
                    self.evaluate_dags().await;
                }
            }
        }
    }

    async fn evaluate_cron(&self) {
        let now = Utc::now();
        let due = match self.store.list_due_cron_templates(now).await {
            Ok(templates) => templates,
            Err(err) => {
                tracing::warn!(error = %err, "failed to list due cron templates");
                return;
            }
        };

        for template in due {
            let Some(expr) = template.cron_expr.clone() else {
                continue;
            };
            let schedule = match cron::Schedule::from_str(&expr) {
                Ok(schedule) => schedule,
                Err(err) => {
                    tracing::warn!(template_id = %template.id, %expr, error = %err, "unparsable cron expression, skipping");
                    continue;
                }
            };
            let Some(next_run) = schedule.after(&now).next() else {
                tracing::warn!(template_id = %template.id, %expr, "cron expression has no future firing, skipping");
                continue;
            };

            let instance_id = format!("{}-{}", template.id, now.timestamp_millis());
            let mut instance = Job::new(instance_id, template.queue.clone(), template.payload.clone());
            instance.run_at = Some(now);
            instance.retry_policy = template.retry_policy;
            instance.timeout = template.timeout;
            instance.max_retries = template.max_retries;
            instance.dependencies = template.dependencies.clone();

            if let Err(err) = self
                .store
                .fire_cron_template(&template.id, instance, next_run)
                .await
            {
                tracing::error!(template_id = %template.id, error = %err, "failed to fire cron template");
            } else {
                tracing::info!(template_id = %template.id, %next_run, "materialised cron instance");
            }
        }
    }

    async fn evaluate_dags(&self) {
        match self.store.release_satisfied_dependents().await {
            Ok(0) => {}
            Ok(released) => tracing::info!(released, "released DAG-gated dependents"),
            Err(err) => tracing::warn!(error = %err, "failed to evaluate DAG dependents"),
        }
    }
}
