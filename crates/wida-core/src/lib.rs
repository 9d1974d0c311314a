//! # wida-core
//!
//! Domain types and policy-light interfaces for Wida, a Postgres-backed
//! distributed job queue: at-least-once execution, exponential-backoff
//! retries with a dead-letter sink, DAG-aware dependency ordering, and a
//! leader-elected scheduler for cron materialisation and dependency
//! release.
//!
//! This crate defines the contract — [`JobStore`], [`Executor`],
//! [`LeaderElection`] — and the parts of the system that are pure policy
//! with no I/O of their own: the [`worker`] pool loop, the
//! [`scheduler`], and the stale-lease [`reclaim::Reclaimer`]. The
//! SQL-backed implementation of the storage and election traits lives in
//! `wida-postgres`; an in-memory implementation for tests lives in
//! `wida-testing`.
//!
//! ## Architecture
//!
//! ```text
//! widactl ──HTTP──► wida-http ──┐
//!                                ▼
//!                          JobStore (trait)
//!                                ▲
//!                 ┌──────────────┼──────────────┬──────────────┐
//!                 │              │              │              │
//!            WorkerPool      Scheduler       Reclaimer    wida-postgres
//!          (claims, runs,   (leader-        (stale-lease   (PgJobStore,
//!           retries, DLQs)   elected cron     sweep, every   PgLeaderElection)
//!                             + DAG release)   node runs it)
//! ```
//!
//! ## Key invariants
//!
//! 1. A job is claimed by at most one worker at a time (`dequeue` is
//!    atomic, `SELECT ... FOR UPDATE SKIP LOCKED` under Postgres).
//! 2. A terminal attempt is always recorded before a status transition —
//!    callers never observe a job move to `pending`/`dead` without a
//!    corresponding `Attempt` in its history.
//! 3. Retry delay is a pure function of attempt count and policy; see
//!    [`retry::calculate_retry_delay`].
//! 4. A job with unsatisfied dependencies is never dequeued, regardless
//!    of `run_at`.
//! 5. At most one node acts as scheduler leader at any instant; see
//!    [`leader::LeaderElection`].

pub mod cancellation;
pub mod executor;
pub mod job;
pub mod leader;
pub mod reclaim;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod worker;

pub use cancellation::{CancellationSource, CancellationToken};
pub use executor::{ExecutionContext, Executor, NoopExecutor};
pub use job::{Attempt, DlqEntry, Job, RetryPolicy, Status, WorkerStats};
pub use leader::LeaderElection;
pub use reclaim::{Reclaimer, ReclaimerConfig};
pub use retry::calculate_retry_delay;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use store::{JobFilter, JobStore, StoreError, StoreResult};
pub use worker::{ExecutorRegistry, WorkerPool, WorkerPoolConfig, WorkerPoolHandle};
