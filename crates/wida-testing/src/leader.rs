//! An in-memory `LeaderElection` fake: several handles share one `holder`
//! slot behind a mutex, so a multi-node cluster can be simulated in a
//! single process to exercise leader-uniqueness behaviour.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use wida_core::leader::LeaderElection;

struct SharedState {
    holder: Option<String>,
}

pub struct InMemoryLeaderElection {
    id: String,
    shared: Arc<Mutex<SharedState>>,
    is_leader: AtomicBool,
}

impl InMemoryLeaderElection {
    /// Builds a standalone election with no competing instance.
    pub fn solo(id: impl Into<String>) -> Self {
        Self::new(id, Arc::new(Mutex::new(SharedState { holder: None })))
    }

    /// Builds `ids.len()` handles contending over one shared lock, as if
    /// they were `ids.len()` scheduler processes in the same cluster.
    pub fn cluster(ids: &[&str]) -> Vec<Self> {
        let shared = Arc::new(Mutex::new(SharedState { holder: None }));
        ids.iter().map(|id| Self::new(*id, shared.clone())).collect()
    }

    fn new(id: impl Into<String>, shared: Arc<Mutex<SharedState>>) -> Self {
        Self {
            id: id.into(),
            shared,
            is_leader: AtomicBool::new(false),
        }
    }

    /// Simulates the current leader crashing without releasing its lock
    /// cleanly — as a real node dying mid-leadership would — so tests can
    /// exercise "another instance takes over" rather than the orderly
    /// `release()` path.
    pub fn simulate_crash(&self) {
        let mut state = self.shared.lock().unwrap();
        if state.holder.as_deref() == Some(self.id.as_str()) {
            state.holder = None;
        }
        self.is_leader.store(false, Ordering::Release);
    }
}

#[async_trait]
impl LeaderElection for InMemoryLeaderElection {
    async fn try_acquire(&self) -> anyhow::Result<bool> {
        let mut state = self.shared.lock().unwrap();
        let acquired = match &state.holder {
            Some(holder) if holder == &self.id => true,
            Some(_) => false,
            None => {
                state.holder = Some(self.id.clone());
                true
            }
        };
        self.is_leader.store(acquired, Ordering::Release);
        Ok(acquired)
    }

    async fn release(&self) -> anyhow::Result<()> {
        let mut state = self.shared.lock().unwrap();
        if state.holder.as_deref() == Some(self.id.as_str()) {
            state.holder = None;
        }
        self.is_leader.store(false, Ordering::Release);
        Ok(())
    }

    fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::Acquire)
    }
}
