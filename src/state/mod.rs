pub mod ball;
pub mod fixture;
pub mod result;
pub mod scoring;
mod sse;
pub mod state_machine;
pub mod stats;

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::timeout;

use crate::{
    config::AppConfig,
    dao::{ball_store::BallEventStore, storage::StorageError},
    error::ServiceError,
    state::{fixture::MatchId, scoring::ScoringEngine},
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

/// A loaded match: its engine behind a lock plus the SSE hub of its viewers.
///
/// The lock serialises submissions, undo and realtime refreshes of the match.
pub struct MatchSlot {
    engine: Mutex<ScoringEngine>,
    sse: SseHub,
    watched: AtomicBool,
    loaded_at: Instant,
    /// Milliseconds after `loaded_at` of the latest access.
    last_used_ms: AtomicU64,
}

impl MatchSlot {
    fn new(engine: ScoringEngine, capacity: usize) -> Self {
        Self {
            sse: SseHub::new(engine.fixture().id, capacity),
            engine: Mutex::new(engine),
            watched: AtomicBool::new(false),
            loaded_at: Instant::now(),
            last_used_ms: AtomicU64::new(0),
        }
    }

    /// Record an access to the match.
    pub fn touch(&self) {
        let now = u64::try_from(self.loaded_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_used_ms.fetch_max(now, Ordering::AcqRel);
    }

    /// Whether nobody views or scores the match and it went unused for `after`.
    pub fn is_idle(&self, after: Duration) -> bool {
        let last_used = Duration::from_millis(self.last_used_ms.load(Ordering::Acquire));
        self.sse.subscriber_count() == 0
            && self.engine.try_lock().is_ok()
            && self.loaded_at.elapsed().saturating_sub(last_used) >= after
    }

    /// Engine of the match.
    pub fn engine(&self) -> &Mutex<ScoringEngine> {
        &self.engine
    }

    /// Broadcast hub for this match's SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Mark the slot as watched, returning `true` for the first caller only.
    pub fn claim_watch(&self) -> bool {
        !self.watched.swap(true, Ordering::AcqRel)
    }

    /// Allow a new watcher to be started.
    pub fn release_watch(&self) {
        self.watched.store(false, Ordering::Release);
    }
}

/// Central application state storing the store handle and loaded matches.
pub struct AppState {
    store: RwLock<Option<Arc<dyn BallEventStore>>>,
    matches: DashMap<MatchId, Arc<MatchSlot>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            matches: DashMap::new(),
            degraded: degraded_tx,
            config,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn BallEventStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current store or fail with [`ServiceError::Degraded`].
    pub async fn require_store(&self) -> Result<Arc<dyn BallEventStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn BallEventStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Loaded match, if any.
    pub fn slot(&self, id: MatchId) -> Option<Arc<MatchSlot>> {
        self.matches.get(&id).map(|entry| entry.value().clone())
    }

    /// Register a loaded engine. An engine loaded concurrently by another request wins.
    pub fn insert_slot(&self, id: MatchId, engine: ScoringEngine) -> Arc<MatchSlot> {
        self.matches
            .entry(id)
            .or_insert_with(|| Arc::new(MatchSlot::new(engine, self.config.sse_capacity)))
            .value()
            .clone()
    }

    /// Forget `slot` if it is still the loaded slot of `id` and has been idle for
    /// `after`. The next access reloads the match from the store.
    pub fn evict_if_idle(&self, id: MatchId, slot: &Arc<MatchSlot>, after: Duration) -> bool {
        self.matches
            .remove_if(&id, |_, current| Arc::ptr_eq(current, slot) && slot.is_idle(after))
            .is_some()
    }

    /// Identifiers of the matches currently loaded.
    pub fn loaded_matches(&self) -> Vec<MatchId> {
        self.matches.iter().map(|entry| *entry.key()).collect()
    }

    /// Run a store call under the configured deadline.
    pub async fn with_store_timeout<F, T>(&self, work: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        match timeout(self.config.store_timeout, work).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(ServiceError::Timeout),
        }
    }
}
