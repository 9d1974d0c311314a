//! A scriptable `Executor` fake: queue up per-job outcomes (or fall back
//! to a single default), and record execution history so tests can
//! assert on total execution count and that no job id is ever in flight
//! in two places at once.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use wida_core::executor::{ExecutionContext, Executor};
use wida_core::job::Job;

#[derive(Clone)]
pub enum ExecutorOutcome {
    Success,
    Failure(String),
}

struct MockExecutorState {
    scripted: HashMap<String, VecDeque<ExecutorOutcome>>,
    default_outcome: ExecutorOutcome,
    in_flight: HashSet<String>,
    total_executions: u64,
    executed_job_ids: Vec<String>,
}

/// Holds a short `tokio::time::sleep` inside `execute` so that two
/// concurrent callers racing the same job id have a window in which to
/// collide — without it, `in_flight` tracking would never catch the bug
/// it exists to catch.
pub struct MockExecutor {
    state: Mutex<MockExecutorState>,
    hold: Duration,
}

impl MockExecutor {
    pub fn new(default_outcome: ExecutorOutcome) -> Self {
        Self {
            state: Mutex::new(MockExecutorState {
                scripted: HashMap::new(),
                default_outcome,
                in_flight: HashSet::new(),
                total_executions: 0,
                executed_job_ids: Vec::new(),
            }),
            hold: Duration::from_millis(5),
        }
    }

    pub fn always_succeeding() -> Self {
        Self::new(ExecutorOutcome::Success)
    }

    pub fn always_failing(reason: impl Into<String>) -> Self {
        Self::new(ExecutorOutcome::Failure(reason.into()))
    }

    /// Queues outcomes for a specific job id, consumed front-to-back on
    /// successive attempts; falls back to the default once exhausted.
    pub fn script(&self, job_id: impl Into<String>, outcomes: impl IntoIterator<Item = ExecutorOutcome>) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .insert(job_id.into(), outcomes.into_iter().collect());
    }

    pub fn total_executions(&self) -> u64 {
        self.state.lock().unwrap().total_executions
    }

    pub fn executed_job_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().executed_job_ids.clone()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, ctx: &ExecutionContext, job: &Job) -> anyhow::Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if !state.in_flight.insert(job.id.clone()) {
                anyhow::bail!("job {} is already executing elsewhere", job.id);
            }
        }

        tokio::time::sleep(self.hold).await;

        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.in_flight.remove(&job.id);

            if ctx.is_cancelled() {
                None
            } else {
                state.total_executions += 1;
                state.executed_job_ids.push(job.id.clone());
                Some(
                    state
                        .scripted
                        .get_mut(&job.id)
                        .and_then(|queue| queue.pop_front())
                        .unwrap_or_else(|| state.default_outcome.clone()),
                )
            }
        };

        match outcome {
            None => anyhow::bail!("execution cancelled for job {}", job.id),
            Some(ExecutorOutcome::Success) => Ok(()),
            Some(ExecutorOutcome::Failure(reason)) => Err(anyhow::anyhow!(reason)),
        }
    }
}
