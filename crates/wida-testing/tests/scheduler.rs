//! DAG-release and cron-materialisation scenarios, driven against the
//! in-memory store with a real `Scheduler` loop.

mod common;

use common::wait_until;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wida_core::cancellation::CancellationSource;
use wida_core::executor::Executor;
use wida_core::job::{Job, Status};
use wida_core::scheduler::{Scheduler, SchedulerConfig};
use wida_core::store::JobStore;
use wida_core::worker::{ExecutorRegistry, WorkerPool, WorkerPoolConfig};
use wida_testing::{InMemoryJobStore, InMemoryLeaderElection, MockExecutor};

fn fast_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        election_interval: Duration::from_millis(20),
        evaluation_interval: Duration::from_millis(30),
    }
}

#[tokio::test]
async fn dag_dependent_is_released_once_its_predecessor_succeeds() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

    let job_a = Job::new("a", "default", json!({}));
    store.enqueue(job_a).await.unwrap();

    let mut job_b = Job::new("b", "default", json!({}));
    job_b.dependencies = vec!["a".to_string()];
    store.enqueue(job_b).await.unwrap();

    let election = Arc::new(InMemoryLeaderElection::solo("scheduler-1"));
    let scheduler = Scheduler::new(store.clone(), election, fast_scheduler_config());
    let (scheduler_shutdown_src, scheduler_shutdown) = CancellationSource::new();
    let scheduler_task = tokio::spawn(scheduler.run(scheduler_shutdown));

    let mut registry = ExecutorRegistry::new();
    registry.register("default", Arc::new(MockExecutor::always_succeeding()) as Arc<dyn Executor>);
    let pool = WorkerPool::new(
        store.clone(),
        registry,
        WorkerPoolConfig {
            pool_id: "test".to_string(),
            queues: vec!["default".to_string()],
            poll_interval: Duration::from_millis(20),
            heartbeat_interval: Duration::from_millis(50),
        },
    );
    let pool_handle = pool.start(1);

    wait_until(Duration::from_secs(3), || {
        let store = store.clone();
        async move {
            let b = store.get_job("b").await.unwrap().unwrap();
            b.status == Status::Success
        }
    })
    .await;

    let b = store.get_job("b").await.unwrap().unwrap();
    assert!(b.dependencies.is_empty());

    pool_handle.shutdown().await;
    scheduler_shutdown_src.cancel();
    let _ = scheduler_task.await;
}

#[tokio::test]
async fn dependent_is_never_claimed_before_its_predecessor_succeeds() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

    let mut job_a = Job::new("a", "default", json!({}));
    job_a.status = Status::Pending;
    store.enqueue(job_a).await.unwrap();

    let mut job_b = Job::new("b", "default", json!({}));
    job_b.dependencies = vec!["a".to_string()];
    store.enqueue(job_b).await.unwrap();

    let queues = vec!["default".to_string()];
    // "a" is eligible and claimable, "b" must never be handed out while gated.
    for _ in 0..5 {
        let claimed = store.dequeue(&queues, "probe").await.unwrap();
        if let Some(job) = claimed {
            assert_ne!(job.id, "b", "dependent must not be claimed while its predecessor is pending");
            break;
        }
    }
}

#[tokio::test]
async fn cron_template_materialises_a_new_pending_instance() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

    let mut template = Job::new("nightly", "default", json!({"task": "cleanup"}));
    template.cron_expr = Some("* * * * * *".to_string());
    template.cron_next_run = Some(chrono::Utc::now() - chrono::Duration::seconds(1));
    store.enqueue(template).await.unwrap();

    let election = Arc::new(InMemoryLeaderElection::solo("scheduler-1"));
    let scheduler = Scheduler::new(store.clone(), election, fast_scheduler_config());
    let (shutdown_src, shutdown) = CancellationSource::new();
    let task = tokio::spawn(scheduler.run(shutdown));

    wait_until(Duration::from_secs(3), || {
        let store = store.clone();
        async move {
            store
                .list_jobs(&Default::default(), 50, 0)
                .await
                .unwrap()
                .iter()
                .any(|job| job.id != "nightly" && job.queue == "default")
        }
    })
    .await;

    let jobs = store.list_jobs(&Default::default(), 50, 0).await.unwrap();
    let instance = jobs.iter().find(|job| job.id != "nightly").unwrap();
    assert_eq!(instance.status, Status::Pending);
    assert_eq!(instance.payload, json!({"task": "cleanup"}));

    let template = store.get_job("nightly").await.unwrap().unwrap();
    assert!(template.cron_next_run.unwrap() > chrono::Utc::now() - chrono::Duration::seconds(1));

    shutdown_src.cancel();
    let _ = task.await;
}
