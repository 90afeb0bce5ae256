//! Publish/subscribe hub
//!
//! One hub per pipeline instance. The writer publishes `NewData` after each
//! flush, management operations publish their own kinds, and the aggregator
//! and SSE clients subscribe to the kinds they care about.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;

use super::events::{Notification, NotificationKind};
use crate::utils::current_timestamp_ms;

const DEFAULT_CAPACITY: usize = 256;

/// Why a subscription could not yield a notification
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    #[error("subscriber lagged behind and missed {0} notifications")]
    Lagged(u64),
    #[error("notification hub closed")]
    Closed,
}

struct HubInner {
    tx: broadcast::Sender<Notification>,
    sequence_counter: AtomicU64,
    last_by_kind: [AtomicU64; NotificationKind::ALL.len()],
}

/// Cloneable handle to a notification registry
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a hub whose subscribers may fall `capacity` messages behind
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(HubInner {
                tx,
                sequence_counter: AtomicU64::new(0),
                last_by_kind: Default::default(),
            }),
        }
    }

    /// Publish a notification, returning its sequence ID
    pub fn publish(&self, kind: NotificationKind) -> u64 {
        self.publish_with(kind, None)
    }

    /// Publish a notification that concerns `records` records
    pub fn publish_with(&self, kind: NotificationKind, records: Option<usize>) -> u64 {
        let sequence_id = self.inner.sequence_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.last_by_kind[kind.index()].fetch_max(sequence_id, Ordering::SeqCst);

        let notification = Notification {
            kind,
            sequence_id,
            records,
            timestamp: current_timestamp_ms(),
        };
        // Ignore errors - just means nobody is subscribed
        let _ = self.inner.tx.send(notification);
        sequence_id
    }

    /// Sequence ID of the most recent notification of any kind (0 if none)
    pub fn current_sequence_id(&self) -> u64 {
        self.inner.sequence_counter.load(Ordering::SeqCst)
    }

    /// Sequence ID of the most recent notification of `kind` (0 if none)
    pub fn last_sequence(&self, kind: NotificationKind) -> u64 {
        self.inner.last_by_kind[kind.index()].load(Ordering::SeqCst)
    }

    /// Highest sequence ID among the given kinds
    pub fn latest_of(&self, kinds: &[NotificationKind]) -> u64 {
        kinds
            .iter()
            .map(|kind| self.last_sequence(*kind))
            .max()
            .unwrap_or(0)
    }

    /// Subscribe to the given kinds
    pub fn subscribe(&self, kinds: &[NotificationKind]) -> Subscription {
        Subscription {
            rx: self.inner.tx.subscribe(),
            kinds: kinds.to_vec(),
        }
    }

    /// Subscribe to every kind
    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(&NotificationKind::ALL)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end filtered to a set of kinds
pub struct Subscription {
    rx: broadcast::Receiver<Notification>,
    kinds: Vec<NotificationKind>,
}

impl Subscription {
    /// Wait for the next notification of a subscribed kind
    pub async fn recv(&mut self) -> Result<Notification, RecvError> {
        loop {
            match self.rx.recv().await {
                Ok(notification) if self.kinds.contains(&notification.kind) => {
                    return Ok(notification)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => return Err(RecvError::Lagged(n)),
                Err(broadcast::error::RecvError::Closed) => return Err(RecvError::Closed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_increment() {
        let hub = NotificationHub::new();
        assert_eq!(hub.current_sequence_id(), 0);

        assert_eq!(hub.publish(NotificationKind::NewData), 1);
        assert_eq!(hub.publish(NotificationKind::SettingsReset), 2);

        assert_eq!(hub.current_sequence_id(), 2);
        assert_eq!(hub.last_sequence(NotificationKind::NewData), 1);
        assert_eq!(hub.last_sequence(NotificationKind::LogCleared), 0);
        assert_eq!(
            hub.latest_of(&[NotificationKind::NewData, NotificationKind::SettingsReset]),
            2
        );
    }

    #[tokio::test]
    async fn test_subscription_filters_kinds() {
        let hub = NotificationHub::new();
        let mut sub = hub.subscribe(&[NotificationKind::SettingsReset]);

        hub.publish(NotificationKind::NewData);
        hub.publish(NotificationKind::SettingsReset);

        let received = sub.recv().await.unwrap();
        assert_eq!(received.kind, NotificationKind::SettingsReset);
        assert_eq!(received.sequence_id, 2);
    }

    #[tokio::test]
    async fn test_subscribers_each_receive() {
        let hub = NotificationHub::new();
        let mut first = hub.subscribe_all();
        let mut second = hub.subscribe(&[NotificationKind::NewData]);

        hub.publish_with(NotificationKind::NewData, Some(5));

        assert_eq!(first.recv().await.unwrap().records, Some(5));
        assert_eq!(second.recv().await.unwrap().kind, NotificationKind::NewData);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_is_told() {
        let hub = NotificationHub::with_capacity(2);
        let mut sub = hub.subscribe_all();

        for _ in 0..5 {
            hub.publish(NotificationKind::NewData);
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
        assert!(sub.recv().await.is_ok());
    }
}
