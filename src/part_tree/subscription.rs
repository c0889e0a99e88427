use super::node::{NodeId, TreeNode};
use crate::services::history::HistoryError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Notification delivered to projector subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum TreeEvent {
    /// Full visible row list after a completed mutation
    Snapshot(Arc<[TreeNode]>),
    /// Children fetch for a row failed; the row list is unchanged apart
    /// from the row's loading flag
    FetchFailed {
        id: NodeId,
        item: String,
        error: HistoryError,
    },
}

impl TreeEvent {
    pub fn snapshot(&self) -> Option<&[TreeNode]> {
        match self {
            TreeEvent::Snapshot(rows) => Some(rows),
            TreeEvent::FetchFailed { .. } => None,
        }
    }
}

/// Identifier handed out by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub usize);

/// Receiving end of a projector subscription
///
/// Dropping it unsubscribes lazily: the projector prunes closed channels on
/// the next broadcast.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<TreeEvent>,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event; `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<TreeEvent> {
        if !self.is_active() {
            return None;
        }
        let event = self.rx.recv().await?;
        self.is_active().then_some(event)
    }

    /// Next already-queued event, if any
    pub fn try_recv(&mut self) -> Option<TreeEvent> {
        if !self.is_active() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Drain everything queued so far, keeping only snapshots
    pub fn drain_snapshots(&mut self) -> Vec<Arc<[TreeNode]>> {
        let mut snapshots = Vec::new();
        while let Some(event) = self.try_recv() {
            if let TreeEvent::Snapshot(rows) = event {
                snapshots.push(rows);
            }
        }
        snapshots
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::UnboundedSender<TreeEvent>,
    active: Arc<AtomicBool>,
}

/// Registry of live subscribers
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: Vec<Subscriber>,
    next_id: usize,
}

impl Subscribers {
    pub(crate) fn add(&mut self) -> Subscription {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(true));
        self.entries.push(Subscriber {
            id,
            tx,
            active: Arc::clone(&active),
        });

        Subscription { id, rx, active }
    }

    /// Returns false when `id` was not subscribed
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let Some(pos) = self.entries.iter().position(|s| s.id == id) else {
            return false;
        };
        let subscriber = self.entries.remove(pos);
        subscriber.active.store(false, Ordering::Release);
        true
    }

    pub(crate) fn send_to(&self, id: SubscriptionId, event: TreeEvent) {
        if let Some(subscriber) = self.entries.iter().find(|s| s.id == id) {
            let _ = subscriber.tx.send(event);
        }
    }

    pub(crate) fn broadcast(&mut self, event: TreeEvent) {
        self.entries.retain(|s| s.tx.send(event.clone()).is_ok());
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Arc<[TreeNode]> {
        vec![TreeNode::new(NodeId(0), "Fruits", 0, true)].into()
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let mut subscribers = Subscribers::default();
        let mut a = subscribers.add();
        let mut b = subscribers.add();
        assert_ne!(a.id(), b.id());

        subscribers.broadcast(TreeEvent::Snapshot(rows()));

        assert_eq!(a.recv().await.unwrap().snapshot().unwrap().len(), 1);
        assert_eq!(b.recv().await.unwrap().snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_discards_queued_events() {
        let mut subscribers = Subscribers::default();
        let mut sub = subscribers.add();

        subscribers.broadcast(TreeEvent::Snapshot(rows()));
        assert!(subscribers.remove(sub.id()));
        assert!(!subscribers.remove(sub.id()));

        assert!(!sub.is_active());
        assert!(sub.try_recv().is_none());
        assert_eq!(subscribers.len(), 0);
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let mut subscribers = Subscribers::default();
        let sub = subscribers.add();
        let _kept = subscribers.add();
        drop(sub);

        subscribers.broadcast(TreeEvent::Snapshot(rows()));
        assert_eq!(subscribers.len(), 1);
    }

    #[test]
    fn test_drain_skips_failures() {
        let mut subscribers = Subscribers::default();
        let mut sub = subscribers.add();

        subscribers.broadcast(TreeEvent::FetchFailed {
            id: NodeId(0),
            item: "Fruits".to_string(),
            error: HistoryError::fetch_failed("Fruits", "503"),
        });
        subscribers.broadcast(TreeEvent::Snapshot(rows()));

        assert_eq!(sub.drain_snapshots().len(), 1);
        assert!(sub.try_recv().is_none());
    }
}
