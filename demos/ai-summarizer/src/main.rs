//! # Summarizer Executor
//!
//! A second `Executor` demo, this time calling out to an external
//! text-completion HTTP API — just `reqwest` + `serde`, no adapter. The
//! endpoint and model are read from the environment rather than
//! hard-coded so this demo works against whatever completion API the
//! integrator points it at.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wida_core::executor::{ExecutionContext, Executor};
use wida_core::job::Job;
use wida_core::store::JobStore;
use wida_core::worker::{ExecutorRegistry, WorkerPool, WorkerPoolConfig};
use wida_testing::InMemoryJobStore;

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    prompt: String,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

/// Expects a payload of the shape `{"text": "..."}` and posts a
/// summarization prompt to `SUMMARIZER_API_URL`. Errors become the
/// attempt's `error` field and feed the retry/DLQ decision exactly like
/// any other executor failure.
struct SummarizerExecutor {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

#[async_trait]
impl Executor for SummarizerExecutor {
    async fn execute(&self, ctx: &ExecutionContext, job: &Job) -> Result<()> {
        let text = job
            .payload
            .get("text")
            .and_then(|v| v.as_str())
            .context("payload missing string field \"text\"")?;

        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: format!("Summarize this text in 2-3 sentences:\n\n{text}"),
            max_tokens: 256,
        };

        let mut req = self.client.post(&self.api_url).json(&request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        tokio::select! {
            result = req.send() => {
                let response = result?;
                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    bail!("summarizer api error {status}: {body}");
                }
                let completion: CompletionResponse = response.json().await?;
                tracing::info!(job_id = %job.id, summary = %completion.text, "summary generated");
                Ok(())
            }
            _ = ctx.cancellation.cancelled() => {
                bail!("summarization of job {} cancelled", job.id);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let api_url = std::env::var("SUMMARIZER_API_URL")
        .unwrap_or_else(|_| "http://localhost:11434/v1/completions".to_string());
    let api_key = std::env::var("SUMMARIZER_API_KEY").ok();
    let model = std::env::var("SUMMARIZER_MODEL").unwrap_or_else(|_| "default".to_string());

    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let executor = Arc::new(SummarizerExecutor {
        client: reqwest::Client::new(),
        api_url,
        api_key,
        model,
    });

    let mut registry = ExecutorRegistry::new();
    registry.register("summarize", executor as Arc<dyn Executor>);

    let text = "Rust is a multi-paradigm, general-purpose programming language that emphasizes \
                performance, type safety, and concurrency. It enforces memory safety without a \
                garbage collector, and its borrow checker tracks object lifetimes at compile time.";

    let job = Job::new("summarize-1", "summarize", json!({"text": text}));
    store.enqueue(job).await?;

    let pool = WorkerPool::new(
        store.clone(),
        registry,
        WorkerPoolConfig {
            pool_id: "summarizer-demo".to_string(),
            queues: vec!["summarize".to_string()],
            poll_interval: Duration::from_millis(200),
            heartbeat_interval: Duration::from_secs(30),
        },
    );
    let handle = pool.start(1);

    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.shutdown().await;

    Ok(())
}
