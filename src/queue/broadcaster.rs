// Event broadcaster - best-effort fan-out of snapshots to subscribers
use super::types::ControllerSnapshot;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Per-subscriber queue depth; a subscriber that falls this far behind loses messages
pub const SUBSCRIBER_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Receiving end handed to a subscriber
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub rx: mpsc::Receiver<ControllerSnapshot>,
}

#[derive(Debug, Default)]
pub struct Broadcaster {
    next_id: u64,
    subscribers: BTreeMap<SubscriberId, mpsc::Sender<ControllerSnapshot>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.next_id += 1;
        let id = SubscriberId(self.next_id);
        self.subscribers.insert(id, tx);
        log::debug!("📡 Subscriber {} added ({} total)", id.0, self.subscribers.len());
        Subscription { id, rx }
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            log::debug!("📡 Subscriber {} removed ({} left)", id.0, self.subscribers.len());
        }
        removed
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver `snapshot` to every subscriber without waiting on any of them.
    /// Subscribers whose receiver is gone are dropped; returns how many got it.
    pub fn publish(&mut self, snapshot: &ControllerSnapshot) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|id, tx| match tx.try_send(snapshot.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                log::warn!("⚠️ Subscriber {} is lagging; snapshot dropped for it", id.0);
                true
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("📡 Subscriber {} disconnected; removing", id.0);
                false
            }
        });
        delivered
    }
}
