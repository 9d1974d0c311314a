//! Cluster-wide mutual exclusion for the scheduler, abstracted as a named
//! mutex with automatic release on session loss. The canonical
//! implementation (`wida-postgres::PgLeaderElection`) anchors this in a
//! Postgres advisory lock; any primitive with the same guarantee (an
//! external coordinator, a lease row) satisfies the trait.

use async_trait::async_trait;

#[async_trait]
pub trait LeaderElection: Send + Sync {
    /// Attempts to become leader. Returns `true` if this call acquired
    /// leadership, `false` if another holder already has it.
    async fn try_acquire(&self) -> anyhow::Result<bool>;

    /// Releases leadership. A no-op if this instance is not the leader.
    async fn release(&self) -> anyhow::Result<()>;

    /// Current leadership status as last observed by this instance.
    fn is_leader(&self) -> bool;
}
