//! A single root cancellation signal (process shutdown) that fans out to
//! every worker loop, heartbeat task, and scheduler loop. Modeled as a
//! value passed into every long-running call, using a plain
//! `tokio::sync::watch<bool>` rather than pulling in a dedicated
//! cancellation-token crate.

use tokio::sync::watch;

#[derive(Clone)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
}

pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

impl CancellationSource {
    pub fn new() -> (Self, CancellationToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancellationToken { rx })
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Safe to await
    /// concurrently from many clones.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        // A send error means the source was dropped without cancelling,
        // which only happens during shutdown teardown; treat it the same
        // as cancellation so callers don't hang.
        let _ = rx.changed().await;
    }
}
