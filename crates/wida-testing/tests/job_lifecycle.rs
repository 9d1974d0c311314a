//! End-to-end lifecycle scenarios, driven against the in-memory
//! `JobStore` + the real `WorkerPool` loop (no Postgres involved — the
//! claim atomicity these exercise is the loop logic, not the SQL; the SQL
//! itself is a documented contract in `wida-postgres`).

mod common;

use common::wait_until;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use wida_core::executor::Executor;
use wida_core::job::{Job, RetryPolicy, Status};
use wida_core::store::JobStore;
use wida_core::worker::{ExecutorRegistry, WorkerPool, WorkerPoolConfig};
use wida_testing::{ExecutorOutcome, InMemoryJobStore, MockExecutor};

fn fast_pool_config(queues: &[&str]) -> WorkerPoolConfig {
    WorkerPoolConfig {
        pool_id: "test".to_string(),
        queues: queues.iter().map(|q| q.to_string()).collect(),
        poll_interval: Duration::from_millis(20),
        heartbeat_interval: Duration::from_millis(50),
    }
}

fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        initial_interval: Duration::from_millis(20),
        max_interval: Duration::from_millis(200),
        max_attempts: 5,
    }
}

#[tokio::test]
async fn successful_job_records_one_attempt_and_increments_worker_counter() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let mut registry = ExecutorRegistry::new();
    registry.register("default", Arc::new(MockExecutor::always_succeeding()) as Arc<dyn Executor>);

    let mut job = Job::new("j1", "default", json!({}));
    job.max_retries = 1;
    job.retry_policy = fast_retry_policy();
    store.enqueue(job).await.unwrap();

    let pool = WorkerPool::new(store.clone(), registry, fast_pool_config(&["default"]));
    let handle = pool.start(1);

    wait_until(Duration::from_secs(2), || {
        let store = store.clone();
        async move {
            matches!(
                store.get_job("j1").await.unwrap().map(|j| j.status),
                Some(Status::Success)
            )
        }
    })
    .await;

    let job = store.get_job("j1").await.unwrap().unwrap();
    assert_eq!(job.attempts.len(), 1);

    handle.shutdown().await;

    let workers = store.list_workers().await.unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].jobs_completed, 1);
}

#[tokio::test]
async fn one_failure_then_success_records_two_attempts() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let executor = Arc::new(MockExecutor::always_succeeding());
    executor.script("j2", [ExecutorOutcome::Failure("boom".to_string())]);

    let mut registry = ExecutorRegistry::new();
    registry.register("default", executor as Arc<dyn Executor>);

    let mut job = Job::new("j2", "default", json!({}));
    job.max_retries = 2;
    job.retry_policy = fast_retry_policy();
    store.enqueue(job).await.unwrap();

    let pool = WorkerPool::new(store.clone(), registry, fast_pool_config(&["default"]));
    let handle = pool.start(1);

    wait_until(Duration::from_secs(2), || {
        let store = store.clone();
        async move {
            matches!(
                store.get_job("j2").await.unwrap().map(|j| j.status),
                Some(Status::Success)
            )
        }
    })
    .await;

    let job = store.get_job("j2").await.unwrap().unwrap();
    assert_eq!(job.attempts.len(), 2);
    assert_eq!(job.attempts[0].status, Status::Failed);
    assert_eq!(job.attempts[1].status, Status::Success);

    handle.shutdown().await;
}

#[tokio::test]
async fn exhausted_retries_move_the_job_to_the_dlq() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let mut registry = ExecutorRegistry::new();
    registry.register(
        "default",
        Arc::new(MockExecutor::always_failing("persistent failure")) as Arc<dyn Executor>,
    );

    let mut job = Job::new("j3", "default", json!({}));
    job.max_retries = 2;
    job.retry_policy = fast_retry_policy();
    store.enqueue(job).await.unwrap();

    let pool = WorkerPool::new(store.clone(), registry, fast_pool_config(&["default"]));
    let handle = pool.start(1);

    wait_until(Duration::from_secs(2), || {
        let store = store.clone();
        async move { store.get_job("j3").await.unwrap().is_none() }
    })
    .await;

    assert!(store.get_job("j3").await.unwrap().is_none());

    let dlq = store.list_dlq(10, 0).await.unwrap();
    assert_eq!(dlq.len(), 1);
    assert_eq!(dlq[0].id, "j3");
    assert_eq!(dlq[0].attempts.len(), 2);
    assert_eq!(dlq[0].reason, "persistent failure");

    handle.shutdown().await;
}

#[tokio::test]
async fn delayed_start_is_not_claimed_before_run_at() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

    let mut job = Job::new("j4", "default", json!({}));
    job.run_at = Some(chrono::Utc::now() + chrono::Duration::milliseconds(300));
    store.enqueue(job).await.unwrap();

    let queues = vec!["default".to_string()];
    assert!(store.dequeue(&queues, "w-1").await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(350)).await;
    let claimed = store.dequeue(&queues, "w-1").await.unwrap();
    assert_eq!(claimed.unwrap().id, "j4");
}

#[tokio::test]
async fn shutdown_stops_new_claims() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let mut registry = ExecutorRegistry::new();
    registry.register("default", Arc::new(MockExecutor::always_succeeding()) as Arc<dyn Executor>);

    let pool = WorkerPool::new(store.clone(), registry, fast_pool_config(&["default"]));
    let handle = pool.start(2);

    // Let the workers register and poll at least once before shutting down.
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.shutdown().await;

    let mut job = Job::new("j5", "default", json!({}));
    job.retry_policy = fast_retry_policy();
    store.enqueue(job).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let job = store.get_job("j5").await.unwrap().unwrap();
    assert_eq!(job.status, Status::Pending, "no worker should still be polling after shutdown");
}

#[tokio::test]
async fn every_job_is_claimed_by_exactly_one_worker() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let executor = Arc::new(MockExecutor::always_succeeding());

    let mut registry = ExecutorRegistry::new();
    registry.register("default", executor.clone() as Arc<dyn Executor>);

    const JOB_COUNT: usize = 40;
    for i in 0..JOB_COUNT {
        let job = Job::new(format!("bulk-{i}"), "default", json!({"i": i}));
        store.enqueue(job).await.unwrap();
    }

    let pool = WorkerPool::new(store.clone(), registry, fast_pool_config(&["default"]));
    let handle = pool.start(8);

    wait_until(Duration::from_secs(5), || {
        let store = store.clone();
        async move {
            store
                .list_jobs(&Default::default(), JOB_COUNT as i64, 0)
                .await
                .unwrap()
                .iter()
                .all(|job| job.status == Status::Success)
        }
    })
    .await;

    handle.shutdown().await;

    assert_eq!(executor.total_executions(), JOB_COUNT as u64);
    let executed: HashSet<String> = executor.executed_job_ids().into_iter().collect();
    assert_eq!(executed.len(), JOB_COUNT, "every job executed exactly once, none twice");
}
