//! The polymorphic capability the worker pool dispatches to once it has
//! claimed a job. The core does not interpret payload bytes; it passes
//! them through to whichever executor is registered for the job's queue.

use crate::cancellation::CancellationToken;
use crate::job::Job;
use async_trait::async_trait;

/// Carries cancellation (shutdown or per-attempt timeout) into `Execute`.
/// Executors that honour `cancelled()` will return promptly instead of
/// being force-aborted.
pub struct ExecutionContext {
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self { cancellation }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, ctx: &ExecutionContext, job: &Job) -> anyhow::Result<()>;
}

/// Always succeeds without doing anything. Used as the default production
/// fallback and in demos; the subprocess/HTTP/container executors that
/// would actually run a payload are out of scope for the core.
pub struct NoopExecutor;

#[async_trait]
impl Executor for NoopExecutor {
    async fn execute(&self, _ctx: &ExecutionContext, job: &Job) -> anyhow::Result<()> {
        tracing::debug!(job_id = %job.id, "NoopExecutor: executing");
        Ok(())
    }
}
