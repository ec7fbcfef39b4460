//! Progress reporting for initiator flows.

use std::fmt;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgressStep {
    Initialising,
    Building,
    Signing,
    Collecting,
    Finalising,
    Done,
}

impl ProgressStep {
    pub fn label(self) -> &'static str {
        match self {
            ProgressStep::Initialising => "Initialising",
            ProgressStep::Building => "Building and verifying the transaction",
            ProgressStep::Signing => "Signing the transaction with our key",
            ProgressStep::Collecting => "Collecting counterparty signatures",
            ProgressStep::Finalising => "Notarising and distributing the transaction",
            ProgressStep::Done => "Done",
        }
    }
}

impl fmt::Display for ProgressStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Publishes the current step of a flow. Any number of observers may
/// subscribe; each sees the latest step.
#[derive(Debug)]
pub struct ProgressTracker {
    step_tx: watch::Sender<ProgressStep>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (step_tx, _) = watch::channel(ProgressStep::Initialising);
        Self { step_tx }
    }

    pub fn set(&self, step: ProgressStep) {
        tracing::debug!(step = %step, "progress");
        self.step_tx.send_replace(step);
    }

    pub fn current(&self) -> ProgressStep {
        *self.step_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressStep> {
        self.step_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_latest_step() {
        let tracker = ProgressTracker::new();
        let mut rx = tracker.subscribe();
        assert_eq!(*rx.borrow(), ProgressStep::Initialising);

        tracker.set(ProgressStep::Building);
        tracker.set(ProgressStep::Signing);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ProgressStep::Signing);
        assert_eq!(tracker.current(), ProgressStep::Signing);
    }

    #[test]
    fn steps_are_ordered() {
        assert!(ProgressStep::Building < ProgressStep::Collecting);
        assert!(ProgressStep::Finalising < ProgressStep::Done);
    }
}
