//! # HTTP Fetcher Executor
//!
//! Demonstrates plugging a real `Executor` into the job queue. Only the
//! `Execute(ctx, job) -> ok|err` contract and a `NoopExecutor` ship with
//! the core — production executors (HTTP, subprocess, container) are
//! the integrator's to write. Uses `reqwest` directly in `execute`, no
//! adapter layer.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wida_core::executor::{ExecutionContext, Executor};
use wida_core::job::Job;
use wida_core::store::JobStore;
use wida_core::worker::{ExecutorRegistry, WorkerPool, WorkerPoolConfig};
use wida_testing::InMemoryJobStore;

/// Expects a payload of the shape `{"url": "https://..."}`. Cancellation
/// is observed by racing the request against `ctx.cancellation`.
struct HttpFetchExecutor {
    client: reqwest::Client,
}

#[async_trait]
impl Executor for HttpFetchExecutor {
    async fn execute(&self, ctx: &ExecutionContext, job: &Job) -> Result<()> {
        let url = job
            .payload
            .get("url")
            .and_then(|v| v.as_str())
            .context("payload missing string field \"url\"")?;

        let request = self.client.get(url).send();
        tokio::select! {
            result = request => {
                let response = result?;
                if response.status().is_success() {
                    tracing::info!(job_id = %job.id, %url, status = %response.status(), "fetch succeeded");
                    Ok(())
                } else {
                    bail!("http {} fetching {}", response.status(), url);
                }
            }
            _ = ctx.cancellation.cancelled() => {
                bail!("fetch of {} cancelled", url);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let executor = Arc::new(HttpFetchExecutor {
        client: reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?,
    });

    let mut registry = ExecutorRegistry::new();
    registry.register("fetch", executor as Arc<dyn Executor>);

    for (i, url) in ["https://example.com", "https://httpbin.org/status/200"].iter().enumerate() {
        let job = Job::new(format!("fetch-{i}"), "fetch", json!({"url": url}));
        store.enqueue(job).await?;
    }

    let pool = WorkerPool::new(
        store.clone(),
        registry,
        WorkerPoolConfig {
            pool_id: "fetch-demo".to_string(),
            queues: vec!["fetch".to_string()],
            poll_interval: Duration::from_millis(200),
            heartbeat_interval: Duration::from_secs(30),
        },
    );
    let handle = pool.start(2);

    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.shutdown().await;

    Ok(())
}
