//! Heartbeat-timeout scenario: a job whose worker crashed mid-execution
//! (no more heartbeats) is rescued back to `pending` rather than sitting
//! `running` forever.

mod common;

use common::wait_until;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wida_core::cancellation::CancellationSource;
use wida_core::job::{Job, Status};
use wida_core::reclaim::{Reclaimer, ReclaimerConfig};
use wida_core::store::JobStore;
use wida_testing::InMemoryJobStore;

#[tokio::test]
async fn stale_running_job_is_reclaimed_back_to_pending() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

    let mut job = Job::new("crashed-1", "default", json!({}));
    job.status = Status::Running;
    job.worker_id = Some("dead-worker".to_string());
    job.last_heartbeat = Some(Utc::now() - chrono::Duration::seconds(500));
    store.enqueue(job).await.unwrap();

    let reclaimer = Reclaimer::new(
        store.clone(),
        ReclaimerConfig {
            interval: Duration::from_millis(10),
            lease_timeout: chrono::Duration::seconds(60),
        },
    );
    let (shutdown_src, shutdown) = CancellationSource::new();
    let task = tokio::spawn(reclaimer.run(shutdown));

    wait_until(Duration::from_secs(1), || {
        let store = store.clone();
        async move {
            matches!(
                store.get_job("crashed-1").await.unwrap().map(|j| j.status),
                Some(Status::Pending)
            )
        }
    })
    .await;

    let job = store.get_job("crashed-1").await.unwrap().unwrap();
    assert!(job.worker_id.is_none());
    assert!(job.last_heartbeat.is_none());

    shutdown_src.cancel();
    let _ = task.await;
}

#[tokio::test]
async fn a_fresh_heartbeat_is_left_alone() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

    let mut job = Job::new("alive-1", "default", json!({}));
    job.status = Status::Running;
    job.worker_id = Some("worker-1".to_string());
    job.last_heartbeat = Some(Utc::now());
    store.enqueue(job).await.unwrap();

    let reclaimer = Reclaimer::new(
        store.clone(),
        ReclaimerConfig {
            interval: Duration::from_millis(10),
            lease_timeout: chrono::Duration::seconds(60),
        },
    );
    let (shutdown_src, shutdown) = CancellationSource::new();
    let task = tokio::spawn(reclaimer.run(shutdown));

    tokio::time::sleep(Duration::from_millis(60)).await;
    shutdown_src.cancel();
    let _ = task.await;

    let job = store.get_job("alive-1").await.unwrap().unwrap();
    assert_eq!(job.status, Status::Running, "heartbeat is within the lease, must not be reclaimed");
}
