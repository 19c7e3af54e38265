use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::dao::{
    ball_store::{BallEventStore, ChangeFeed, ChangeKind, ChangeNotification},
    models::{BallEventEntity, MatchEntity, MatchListItemEntity, MatchStatusUpdate},
    storage::{StorageError, StorageResult},
};

#[derive(Default)]
struct MemoryData {
    matches: HashMap<Uuid, MatchEntity>,
    events: HashMap<Uuid, Vec<BallEventEntity>>,
}

/// Store keeping everything in process memory.
#[derive(Clone)]
pub struct MemoryBallStore {
    data: Arc<RwLock<MemoryData>>,
    feed: ChangeFeed,
}

impl MemoryBallStore {
    /// Create an empty store whose change channels buffer `capacity` notifications.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(MemoryData::default())),
            feed: ChangeFeed::new(capacity),
        }
    }
}

impl Default for MemoryBallStore {
    fn default() -> Self {
        Self::new(32)
    }
}

fn head_of(events: &[BallEventEntity]) -> u64 {
    events.last().map_or(0, |event| event.sequence)
}

impl BallEventStore for MemoryBallStore {
    fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = entity.id;
            store.data.write().await.matches.insert(id, entity);
            store.feed.notify(id, ChangeKind::MatchUpdated);
            Ok(())
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.data.read().await.matches.get(&id).cloned()) })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let data = store.data.read().await;
            let mut matches: Vec<_> = data.matches.values().cloned().collect();
            matches.sort_by_key(|entity| entity.created_at);
            Ok(matches.into_iter().map(Into::into).collect())
        })
    }

    fn update_match_status(
        &self,
        update: MatchStatusUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let match_id = update.match_id;
            {
                let mut data = store.data.write().await;
                let entity = data
                    .matches
                    .get_mut(&match_id)
                    .ok_or(StorageError::NotFound(match_id))?;
                entity.status = update.status;
                entity.result_text = update.result_text;
                entity.winner_id = update.winner_id;
                entity.updated_at = SystemTime::now();
            }
            store.feed.notify(match_id, ChangeKind::MatchUpdated);
            Ok(())
        })
    }

    fn list_events(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<BallEventEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let data = store.data.read().await;
            Ok(data.events.get(&match_id).cloned().unwrap_or_default())
        })
    }

    fn append_event(
        &self,
        event: BallEventEntity,
        expected_head: u64,
    ) -> BoxFuture<'static, StorageResult<BallEventEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let match_id = event.match_id;
            {
                let mut data = store.data.write().await;
                if !data.matches.contains_key(&match_id) {
                    return Err(StorageError::NotFound(match_id));
                }
                let events = data.events.entry(match_id).or_default();
                if head_of(events) != expected_head || event.sequence != expected_head + 1 {
                    return Err(StorageError::Conflict {
                        match_id,
                        expected: expected_head,
                    });
                }
                events.push(event.clone());
            }
            store.feed.notify(match_id, ChangeKind::EventAppended);
            Ok(event)
        })
    }

    fn delete_event(
        &self,
        match_id: Uuid,
        event_id: Uuid,
        expected_head: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            {
                let mut data = store.data.write().await;
                let events = data
                    .events
                    .get_mut(&match_id)
                    .filter(|events| !events.is_empty())
                    .ok_or(StorageError::NotFound(event_id))?;
                let is_head = events
                    .last()
                    .is_some_and(|head| head.id == event_id && head.sequence == expected_head);
                if !is_head {
                    return Err(StorageError::Conflict {
                        match_id,
                        expected: expected_head,
                    });
                }
                events.pop();
            }
            store.feed.notify(match_id, ChangeKind::EventDeleted);
            Ok(())
        })
    }

    fn subscribe(&self, match_id: Uuid) -> broadcast::Receiver<ChangeNotification> {
        self.feed.subscribe(match_id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dao::models::{MatchStatusEntity, PlayerEntity, TeamEntity};

    pub(crate) fn match_entity() -> MatchEntity {
        let team = |name: &str| TeamEntity {
            id: Uuid::new_v4(),
            name: name.into(),
            players: (0..3)
                .map(|index| PlayerEntity {
                    id: Uuid::new_v4(),
                    name: format!("{name} {index}"),
                })
                .collect(),
        };
        MatchEntity {
            id: Uuid::new_v4(),
            name: "Sunday league".into(),
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
            team_a: team("Lions"),
            team_b: team("Tigers"),
            overs_per_innings: 5,
            bowler_over_limit: 1,
            toss: None,
            status: MatchStatusEntity::AwaitingToss,
            result_text: None,
            winner_id: None,
        }
    }

    fn event(entity: &MatchEntity, sequence: u64) -> BallEventEntity {
        BallEventEntity {
            id: Uuid::new_v4(),
            match_id: entity.id,
            innings: 1,
            batting_team_id: entity.team_a.id,
            sequence,
            over: 0,
            ball: u8::try_from(sequence).unwrap(),
            striker_id: entity.team_a.players[0].id,
            non_striker_id: entity.team_a.players[1].id,
            bowler_id: entity.team_b.players[0].id,
            runs: 1,
            extras: 0,
            extra_kind: None,
            is_wicket: false,
            wicket_kind: None,
            dismissed_id: None,
            fielder_id: None,
            recorded_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn append_requires_the_expected_head() {
        let store = MemoryBallStore::default();
        let entity = match_entity();
        store.save_match(entity.clone()).await.unwrap();

        store.append_event(event(&entity, 1), 0).await.unwrap();
        let err = store.append_event(event(&entity, 1), 0).await.unwrap_err();
        assert!(err.is_conflict());

        store.append_event(event(&entity, 2), 1).await.unwrap();
        let events = store.list_events(entity.id).await.unwrap();
        assert_eq!(
            events.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn append_to_unknown_match_is_not_found() {
        let store = MemoryBallStore::default();
        let entity = match_entity();
        let err = store.append_event(event(&entity, 1), 0).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(id) if id == entity.id));
    }

    #[tokio::test]
    async fn delete_only_removes_the_current_head() {
        let store = MemoryBallStore::default();
        let entity = match_entity();
        store.save_match(entity.clone()).await.unwrap();
        let first = store.append_event(event(&entity, 1), 0).await.unwrap();
        let second = store.append_event(event(&entity, 2), 1).await.unwrap();

        let err = store.delete_event(entity.id, first.id, 1).await.unwrap_err();
        assert!(err.is_conflict());
        store.delete_event(entity.id, second.id, 2).await.unwrap();
        assert_eq!(store.list_events(entity.id).await.unwrap(), vec![first.clone()]);

        store.delete_event(entity.id, first.id, 1).await.unwrap();
        let err = store.delete_event(entity.id, first.id, 1).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn writes_notify_subscribers() {
        let store = MemoryBallStore::default();
        let entity = match_entity();
        let mut rx = store.subscribe(entity.id);

        store.save_match(entity.clone()).await.unwrap();
        store.append_event(event(&entity, 1), 0).await.unwrap();
        store
            .update_match_status(MatchStatusUpdate {
                match_id: entity.id,
                status: MatchStatusEntity::Completed,
                result_text: Some("Match tied".into()),
                winner_id: None,
            })
            .await
            .unwrap();

        let kinds: Vec<_> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .into_iter()
        .map(|change| change.kind)
        .collect();
        assert_eq!(
            kinds,
            vec![
                ChangeKind::MatchUpdated,
                ChangeKind::EventAppended,
                ChangeKind::MatchUpdated
            ]
        );

        let stored = store.find_match(entity.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatusEntity::Completed);
        assert_eq!(stored.result_text.as_deref(), Some("Match tied"));
    }

    #[tokio::test]
    async fn listing_reports_status() {
        let store = MemoryBallStore::default();
        let entity = match_entity();
        store.save_match(entity.clone()).await.unwrap();
        let list = store.list_matches().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, entity.id);
        assert_eq!(list[0].status, MatchStatusEntity::AwaitingToss);
    }
}
