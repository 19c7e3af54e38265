/// In-process store used when no remote backend is configured.
pub mod memory;
/// PostgREST-compatible HTTP store.
#[cfg(feature = "rest-store")]
pub mod rest;

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::{
    models::{BallEventEntity, MatchEntity, MatchListItemEntity, MatchStatusUpdate},
    storage::StorageResult,
};

/// What changed in the stored data of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A ball event was inserted.
    EventAppended,
    /// A ball event was removed.
    EventDeleted,
    /// The match row changed (toss, status, result).
    MatchUpdated,
}

/// Change pushed to subscribers of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotification {
    /// Match whose data changed.
    pub match_id: Uuid,
    /// Nature of the change.
    pub kind: ChangeKind,
}

/// Abstraction over the persistence and change delivery of matches and their ball events.
///
/// Writes to the event list are guarded by the expected head sequence: a store
/// must fail with [`StorageError::Conflict`](crate::dao::storage::StorageError::Conflict)
/// when the latest stored sequence differs.
pub trait BallEventStore: Send + Sync {
    /// Insert or replace a match row.
    fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a match row.
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// List every match.
    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchListItemEntity>>>;
    /// Change the lifecycle status (and result) of a match.
    fn update_match_status(&self, update: MatchStatusUpdate)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Every ball event of a match, ordered by sequence.
    fn list_events(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<BallEventEntity>>>;
    /// Append an event whose sequence follows `expected_head`, returning the stored row.
    fn append_event(
        &self,
        event: BallEventEntity,
        expected_head: u64,
    ) -> BoxFuture<'static, StorageResult<BallEventEntity>>;
    /// Delete the head event of a match, provided it still is the head.
    fn delete_event(
        &self,
        match_id: Uuid,
        event_id: Uuid,
        expected_head: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Receive change notifications for one match.
    fn subscribe(&self, match_id: Uuid) -> broadcast::Receiver<ChangeNotification>;
    /// Check that the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failure.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Per-match broadcast channels shared by store implementations.
///
/// A channel lives while it has receivers: it is dropped by the first
/// notification or listing that finds nobody subscribed.
#[derive(Clone)]
pub struct ChangeFeed {
    channels: Arc<DashMap<Uuid, broadcast::Sender<ChangeNotification>>>,
    capacity: usize,
}

impl ChangeFeed {
    /// Create a feed whose per-match channels buffer `capacity` notifications.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a subscriber for `match_id`.
    pub fn subscribe(&self, match_id: Uuid) -> broadcast::Receiver<ChangeNotification> {
        self.channels
            .entry(match_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Notify the subscribers of `match_id`, if any.
    pub fn notify(&self, match_id: Uuid, kind: ChangeKind) {
        let unheard = match self.channels.get(&match_id) {
            Some(sender) => sender.send(ChangeNotification { match_id, kind }).is_err(),
            None => return,
        };
        if unheard {
            self.channels
                .remove_if(&match_id, |_, sender| sender.receiver_count() == 0);
        }
    }

    /// Matches that currently have subscribers.
    pub fn watched(&self) -> Vec<Uuid> {
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
        self.channels.iter().map(|entry| *entry.key()).collect()
    }

    /// Whether anyone still listens to `match_id`.
    pub fn has_subscribers(&self, match_id: Uuid) -> bool {
        self.channels
            .get(&match_id)
            .is_some_and(|sender| sender.receiver_count() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notifications_are_scoped_to_their_match() {
        let feed = ChangeFeed::new(4);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rx_a = feed.subscribe(a);
        let mut rx_b = feed.subscribe(b);

        feed.notify(a, ChangeKind::EventAppended);

        assert_eq!(
            rx_a.recv().await.unwrap(),
            ChangeNotification {
                match_id: a,
                kind: ChangeKind::EventAppended
            }
        );
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn notify_without_subscriber_is_a_no_op() {
        let feed = ChangeFeed::new(4);
        feed.notify(Uuid::new_v4(), ChangeKind::MatchUpdated);
        assert!(feed.watched().is_empty());
    }

    #[test]
    fn abandoned_channels_are_dropped() {
        let feed = ChangeFeed::new(4);
        let (kept, left, listed) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let _viewer = feed.subscribe(kept);
        drop(feed.subscribe(left));
        drop(feed.subscribe(listed));
        assert_eq!(feed.channels.len(), 3);

        feed.notify(left, ChangeKind::EventAppended);
        assert!(!feed.channels.contains_key(&left));
        assert!(!feed.has_subscribers(left));

        assert_eq!(feed.watched(), vec![kept]);
        assert!(!feed.channels.contains_key(&listed));

        let mut again = feed.subscribe(left);
        feed.notify(left, ChangeKind::EventDeleted);
        assert_eq!(again.try_recv().unwrap().kind, ChangeKind::EventDeleted);
    }
}
