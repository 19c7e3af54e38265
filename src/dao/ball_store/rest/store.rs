use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use dashmap::DashSet;
use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_with::{TimestampMilliSeconds, serde_as};
use tokio::{sync::broadcast, time::MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dao::{
    ball_store::{BallEventStore, ChangeFeed, ChangeKind, ChangeNotification},
    models::{
        BallEventEntity, MatchEntity, MatchListItemEntity, MatchStatusEntity, MatchStatusUpdate,
    },
    storage::{StorageError, StorageResult},
};

use super::{
    config::RestConfig,
    error::{RestDaoError, RestResult},
};

const MATCHES: &str = "matches";
const BALL_EVENTS: &str = "ball_events";
const RETURN_REPRESENTATION: &str = "return=representation";

/// Latest stored event of a match, as seen by the change poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
struct HeadRow {
    id: Uuid,
    sequence: u64,
}

/// Change markers of a match row, as seen by the change poller.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
struct RowStamp {
    status: MatchStatusEntity,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    updated_at: SystemTime,
}

/// What one poll saw of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RemoteSnapshot {
    row: Option<RowStamp>,
    head: Option<HeadRow>,
}

impl RemoteSnapshot {
    /// Kind of change since `previous`. Event changes win over row changes since
    /// a refresh triggered by them rereads the row too.
    fn change_since(&self, previous: &RemoteSnapshot) -> Option<ChangeKind> {
        if self.head != previous.head {
            let grew = self.head.map(|row| row.sequence) > previous.head.map(|row| row.sequence);
            return Some(if grew {
                ChangeKind::EventAppended
            } else {
                ChangeKind::EventDeleted
            });
        }
        (self.row != previous.row).then_some(ChangeKind::MatchUpdated)
    }
}

#[serde_as]
#[derive(Debug, Serialize)]
struct StatusPatch {
    status: MatchStatusEntity,
    result_text: Option<String>,
    winner_id: Option<Uuid>,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    updated_at: SystemTime,
}

/// Store backed by a PostgREST-compatible HTTP API with `matches` and `ball_events` tables.
///
/// The `ball_events` table carries a unique `(match_id, sequence)` constraint so
/// concurrent appends surface as HTTP 409.
#[derive(Clone)]
pub struct RestBallStore {
    client: Client,
    base_url: Arc<str>,
    api_key: Option<Arc<str>>,
    poll_interval: Duration,
    feed: ChangeFeed,
    pollers: Arc<DashSet<Uuid>>,
}

impl RestBallStore {
    /// Build the client and check that the backend answers.
    pub async fn connect(config: RestConfig, capacity: usize) -> RestResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| RestDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            api_key: config.api_key.map(Arc::from),
            poll_interval: config.poll_interval,
            feed: ChangeFeed::new(capacity),
            pollers: Arc::new(DashSet::new()),
        };

        store.ping().await?;
        Ok(store)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, table);
        let builder = self.client.request(method, url);
        match self.api_key {
            Some(ref key) => builder
                .header("apikey", key.as_ref())
                .bearer_auth(key.as_ref()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, table: &str) -> RestResult<Response> {
        builder
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: table.to_string(),
                source,
            })
    }

    async fn decode<T>(response: Response, table: &str) -> RestResult<T>
    where
        T: DeserializeOwned,
    {
        response
            .json::<T>()
            .await
            .map_err(|source| RestDaoError::DecodeResponse {
                path: table.to_string(),
                source,
            })
    }

    async fn fetch_rows<T>(&self, table: &str, query: &[(&str, String)]) -> RestResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .send(self.request(Method::GET, table).query(query), table)
            .await?;

        if !response.status().is_success() {
            return Err(RestDaoError::RequestStatus {
                path: table.to_string(),
                status: response.status(),
            });
        }

        Self::decode(response, table).await
    }

    async fn ping(&self) -> RestResult<()> {
        self.fetch_rows::<serde_json::Value>(
            MATCHES,
            &[("select", "id".into()), ("limit", "1".into())],
        )
        .await
        .map(|_| ())
    }

    async fn head(&self, match_id: Uuid) -> RestResult<Option<HeadRow>> {
        let rows = self
            .fetch_rows::<HeadRow>(
                BALL_EVENTS,
                &[
                    ("match_id", format!("eq.{match_id}")),
                    ("select", "id,sequence".into()),
                    ("order", "sequence.desc".into()),
                    ("limit", "1".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn row_stamp(&self, match_id: Uuid) -> RestResult<Option<RowStamp>> {
        let rows = self
            .fetch_rows::<RowStamp>(
                MATCHES,
                &[
                    ("id", format!("eq.{match_id}")),
                    ("select", "status,updated_at".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn snapshot(&self, match_id: Uuid) -> RestResult<RemoteSnapshot> {
        let (row, head) = tokio::try_join!(self.row_stamp(match_id), self.head(match_id))?;
        Ok(RemoteSnapshot { row, head })
    }

    /// Poll the remote match row and head event while someone listens, notifying on change.
    fn spawn_poller(&self, match_id: Uuid) {
        if !self.pollers.insert(match_id) {
            return;
        }

        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_seen: Option<RemoteSnapshot> = None;

            loop {
                ticker.tick().await;
                if !store.feed.has_subscribers(match_id) {
                    break;
                }

                match store.snapshot(match_id).await {
                    Ok(snapshot) => {
                        if let Some(kind) = last_seen
                            .as_ref()
                            .and_then(|previous| snapshot.change_since(previous))
                        {
                            store.feed.notify(match_id, kind);
                        }
                        last_seen = Some(snapshot);
                    }
                    Err(err) => {
                        warn!(match_id = %match_id, error = %err, "failed to poll remote match");
                    }
                }
            }

            store.pollers.remove(&match_id);
            debug!(match_id = %match_id, "stopped remote match poller");
            if store.feed.has_subscribers(match_id) {
                store.spawn_poller(match_id);
            }
        });
    }
}

impl BallEventStore for RestBallStore {
    fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let response = store
                .send(
                    store
                        .request(Method::POST, MATCHES)
                        .header("Prefer", "resolution=merge-duplicates,return=minimal")
                        .json(&entity),
                    MATCHES,
                )
                .await?;

            if !response.status().is_success() {
                return Err(RestDaoError::RequestStatus {
                    path: MATCHES.to_string(),
                    status: response.status(),
                }
                .into());
            }

            store.feed.notify(entity.id, ChangeKind::MatchUpdated);
            Ok(())
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = store
                .fetch_rows::<MatchEntity>(MATCHES, &[("id", format!("eq.{id}"))])
                .await?;
            Ok(rows.into_iter().next())
        })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = store
                .fetch_rows::<MatchListItemEntity>(
                    MATCHES,
                    &[
                        ("select", "id,name,status,result_text".into()),
                        ("order", "created_at.asc".into()),
                    ],
                )
                .await?;
            Ok(rows)
        })
    }

    fn update_match_status(
        &self,
        update: MatchStatusUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let match_id = update.match_id;
            let patch = StatusPatch {
                status: update.status,
                result_text: update.result_text,
                winner_id: update.winner_id,
                updated_at: SystemTime::now(),
            };

            let response = store
                .send(
                    store
                        .request(Method::PATCH, MATCHES)
                        .query(&[("id", format!("eq.{match_id}"))])
                        .header("Prefer", RETURN_REPRESENTATION)
                        .json(&patch),
                    MATCHES,
                )
                .await?;

            if !response.status().is_success() {
                return Err(RestDaoError::RequestStatus {
                    path: MATCHES.to_string(),
                    status: response.status(),
                }
                .into());
            }

            let rows: Vec<serde_json::Value> = Self::decode(response, MATCHES).await?;
            if rows.is_empty() {
                return Err(StorageError::NotFound(match_id));
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
            let rows = store
                .fetch_rows::<BallEventEntity>(
                    BALL_EVENTS,
                    &[
                        ("match_id", format!("eq.{match_id}")),
                        ("order", "sequence.asc".into()),
                    ],
                )
                .await?;
            Ok(rows)
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
            let conflict = || StorageError::Conflict {
                match_id,
                expected: expected_head,
            };

            let head = store.head(match_id).await?.map_or(0, |row| row.sequence);
            if head != expected_head || event.sequence != expected_head + 1 {
                return Err(conflict());
            }

            let response = store
                .send(
                    store
                        .request(Method::POST, BALL_EVENTS)
                        .header("Prefer", RETURN_REPRESENTATION)
                        .json(&event),
                    BALL_EVENTS,
                )
                .await?;

            match response.status() {
                StatusCode::CONFLICT => Err(conflict()),
                status if status.is_success() => {
                    let rows: Vec<BallEventEntity> = Self::decode(response, BALL_EVENTS).await?;
                    let stored = rows.into_iter().next().ok_or_else(|| {
                        StorageError::Corrupt(format!("insert of ball `{}` returned no row", event.id))
                    })?;
                    store.feed.notify(match_id, ChangeKind::EventAppended);
                    Ok(stored)
                }
                status => Err(RestDaoError::RequestStatus {
                    path: BALL_EVENTS.to_string(),
                    status,
                }
                .into()),
            }
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
            let response = store
                .send(
                    store
                        .request(Method::DELETE, BALL_EVENTS)
                        .query(&[
                            ("id", format!("eq.{event_id}")),
                            ("match_id", format!("eq.{match_id}")),
                            ("sequence", format!("eq.{expected_head}")),
                        ])
                        .header("Prefer", RETURN_REPRESENTATION),
                    BALL_EVENTS,
                )
                .await?;

            if !response.status().is_success() {
                return Err(RestDaoError::RequestStatus {
                    path: BALL_EVENTS.to_string(),
                    status: response.status(),
                }
                .into());
            }

            let rows: Vec<serde_json::Value> = Self::decode(response, BALL_EVENTS).await?;
            if rows.is_empty() {
                return Err(StorageError::Conflict {
                    match_id,
                    expected: expected_head,
                });
            }

            store.feed.notify(match_id, ChangeKind::EventDeleted);
            Ok(())
        })
    }

    fn subscribe(&self, match_id: Uuid) -> broadcast::Receiver<ChangeNotification> {
        let receiver = self.feed.subscribe(match_id);
        self.spawn_poller(match_id);
        receiver
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}
