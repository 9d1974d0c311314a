//! The Wida daemon: a single process hosting one worker pool, one
//! scheduler contender, one stale-lease reclaimer, and the HTTP surface,
//! all sharing one `PgPool`. Wiring order: apply schema, build the
//! store, contend for scheduler leadership, start the worker pool and
//! reclaimer, then serve HTTP.

mod config;

use config::Config;
use std::sync::Arc;
use wida_core::{ExecutorRegistry, LeaderElection, NoopExecutor, Reclaimer, ReclaimerConfig};
use wida_core::{JobStore, Scheduler, SchedulerConfig, WorkerPool, WorkerPoolConfig};
use wida_postgres::{PgJobStore, PgLeaderElection};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .init();

    let pool = match sqlx::PgPool::connect(&config.database_url).await {
        Ok(pool) => pool,
        Err(err) => {
            tracing::error!(error = %err, "failed to connect to the job store, exiting");
            std::process::exit(1);
        }
    };

    load_schema(&pool, &config.schema_path).await;

    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
    let election: Arc<dyn LeaderElection> = Arc::new(PgLeaderElection::new(pool.clone()));

    let mut executors = ExecutorRegistry::new();
    executors.register("default", Arc::new(NoopExecutor) as Arc<dyn wida_core::Executor>);

    let worker_pool = WorkerPool::new(store.clone(), executors, WorkerPoolConfig::default());
    let pool_handle = worker_pool.start(config.worker_concurrency);
    tracing::info!(workers = config.worker_concurrency, "worker pool started");

    let (scheduler_shutdown_src, scheduler_shutdown) = wida_core::CancellationSource::new();
    let scheduler = Scheduler::new(store.clone(), election.clone(), SchedulerConfig::default());
    let scheduler_task = tokio::spawn(scheduler.run(scheduler_shutdown));

    let (reclaimer_shutdown_src, reclaimer_shutdown) = wida_core::CancellationSource::new();
    let reclaimer = Reclaimer::new(
        store.clone(),
        ReclaimerConfig {
            interval: config.reclaim_interval,
            lease_timeout: config.lease_timeout,
        },
    );
    let reclaimer_task = tokio::spawn(reclaimer.run(reclaimer_shutdown));

    let app = wida_http::build_router(store.clone(), Some(election));
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(addr = %config.bind_address(), "http surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown signal received, stopping worker pool");
    pool_handle.shutdown().await;
    scheduler_shutdown_src.cancel();
    reclaimer_shutdown_src.cancel();
    let _ = scheduler_task.await;
    let _ = reclaimer_task.await;

    tracing::info!("widad stopped");
    Ok(())
}

/// Loads `schema.sql` if present. A missing file is tolerated with a
/// warning (the schema may already be applied out-of-band); a present
/// file that fails to apply is fatal.
async fn load_schema(pool: &sqlx::PgPool, path: &str) {
    let sql = match tokio::fs::read_to_string(path).await {
        Ok(sql) => sql,
        Err(err) => {
            tracing::warn!(%path, error = %err, "schema file not found, assuming schema is already applied");
            return;
        }
    };

    if let Err(err) = sqlx::raw_sql(&sql).execute(pool).await {
        tracing::error!(error = %err, "failed to apply schema, exiting");
        std::process::exit(1);
    }
    tracing::info!(%path, "schema applied");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}
