use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{ball_store::BallEventStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the ball store and keep the shared state in degraded mode while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn BallEventStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match state.with_store_timeout(store.health_check()).await {
                        Ok(()) => {
                            if state.is_degraded() {
                                info!("storage healthy again; leaving degraded mode");
                                state.update_degraded(false);
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "storage health check failed");
                            if reconnect(&state, store.as_ref()).await {
                                state.update_degraded(false);
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            }
                            warn!("exhausted storage reconnect attempts; staying in degraded mode");
                            state.clear_store().await;
                            break;
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Retry the current store a bounded number of times, entering degraded mode on the first failure.
async fn reconnect(state: &SharedState, store: &dyn BallEventStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(reconnect_err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %reconnect_err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;
    use crate::{config::AppConfig, dao::ball_store::memory::MemoryBallStore, state::AppState};

    #[tokio::test]
    async fn first_successful_connection_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();

        let supervised = state.clone();
        let task = tokio::spawn(run(supervised, || async {
            Ok(Arc::new(MemoryBallStore::default()) as Arc<dyn BallEventStore>)
        }));

        timeout(Duration::from_secs(1), watcher.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!state.is_degraded());
        assert!(state.store().await.is_some());
        task.abort();
    }
}
