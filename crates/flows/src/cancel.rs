//! Cooperative cancellation for workflow runs.

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable handle that cancels every run holding a clone of it.
///
/// Flows check the token between steps and race it against session round
/// trips, so cancellation takes effect at the next suspension point.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // The sender lives as long as any clone, so this cannot happen
            // while `self` is alive.
            std::future::pending::<()>().await;
        }
    }
}
