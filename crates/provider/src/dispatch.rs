use crate::reconciler::RefreshTarget;
use std::collections::HashSet;
use tokio::sync::broadcast;

/// Fan-out of refresh-target sets to UI observers.
///
/// The broadcast channel is the observer list: observers subscribe for a
/// receiver, and one that has gone away simply drops it. Dispatching never
/// blocks; with no live observer the set is silently discarded.
#[derive(Debug, Clone)]
pub struct RefreshDispatcher {
    sender: broadcast::Sender<HashSet<RefreshTarget>>,
}

impl RefreshDispatcher {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Hand a target set to the observers. Empty sets are not dispatched.
    pub fn dispatch(&self, targets: HashSet<RefreshTarget>) {
        if targets.is_empty() {
            return;
        }
        let _ = self.sender.send(targets);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HashSet<RefreshTarget>> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RefreshDispatcher {
    fn default() -> Self {
        Self::new(32)
    }
}
