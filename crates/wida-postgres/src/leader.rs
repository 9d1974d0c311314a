//! Postgres advisory-lock backed [`LeaderElection`].
//!
//! Contends for a single constant advisory lock ID via
//! `pg_try_advisory_lock`/`pg_advisory_unlock`. The lock is held on a
//! connection checked out from the pool for the duration of leadership —
//! a lock taken and released on different pooled connections would not
//! survive the holder crashing, since Postgres only releases an advisory
//! lock automatically when the *session* that took it ends.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use wida_core::leader::LeaderElection;

/// Arbitrary constant identifying the "scheduler leader" lock. Any i64
/// works as long as every node agrees on it; chosen here to avoid
/// colliding with application-level advisory lock usage elsewhere.
const SCHEDULER_LOCK_ID: i64 = 84_273_991;

pub struct PgLeaderElection {
    pool: PgPool,
    connection: Mutex<Option<sqlx::pool::PoolConnection<sqlx::Postgres>>>,
    is_leader: AtomicBool,
}

impl PgLeaderElection {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            connection: Mutex::new(None),
            is_leader: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl LeaderElection for PgLeaderElection {
    async fn try_acquire(&self) -> anyhow::Result<bool> {
        if self.is_leader.load(Ordering::Acquire) {
            return Ok(true);
        }

        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query("SELECT pg_try_advisory_lock($1) AS acquired")
            .bind(SCHEDULER_LOCK_ID)
            .fetch_one(&mut *conn)
            .await?;
        let acquired: bool = row.get("acquired");

        if acquired {
            *self.connection.lock().await = Some(conn);
            self.is_leader.store(true, Ordering::Release);
        }

        Ok(acquired)
    }

    async fn release(&self) -> anyhow::Result<()> {
        let mut guard = self.connection.lock().await;
        if let Some(mut conn) = guard.take() {
            sqlx::query("SELECT pg_advisory_unlock($1)")
                .bind(SCHEDULER_LOCK_ID)
                .execute(&mut *conn)
                .await?;
        }
        self.is_leader.store(false, Ordering::Release);
        Ok(())
    }

    fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::Acquire)
    }
}
