//! Keeps loaded matches in step with the store when other scorers write to it.

use std::sync::Arc;

use tokio::{
    sync::broadcast::{
        Receiver,
        error::{RecvError, TryRecvError},
    },
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    dao::ball_store::{BallEventStore, ChangeNotification},
    error::ServiceError,
    services::{scoring_service, sse_events},
    state::{MatchSlot, SharedState, fixture::MatchId},
};

/// Start the change watcher of a loaded match unless one is already running.
pub fn ensure_watcher(state: &SharedState, slot: &Arc<MatchSlot>, match_id: MatchId) {
    if !slot.claim_watch() {
        return;
    }
    tokio::spawn(watch_match(state.clone(), slot.clone(), match_id));
}

/// Refresh the slot of a match each time the store reports a change to it.
///
/// Notifications queued while a refresh runs are folded into the next one, so at
/// most one refresh per match is in flight. The watcher evicts the slot and stops
/// once the match has gone without viewers or use for the configured idle timeout,
/// dropping its change subscription with it.
pub async fn watch_match(state: SharedState, slot: Arc<MatchSlot>, match_id: MatchId) {
    let Some(store) = state.store().await else {
        slot.release_watch();
        return;
    };
    let mut receiver = store.subscribe(match_id);
    let idle_timeout = state.config().slot_idle_timeout;
    debug!(match_id = %match_id, "watching match changes");

    loop {
        let Ok(received) = timeout(idle_timeout, receiver.recv()).await else {
            if state.evict_if_idle(match_id, &slot, idle_timeout) {
                info!(match_id = %match_id, "idle match unloaded");
                break;
            }
            continue;
        };

        match received {
            Ok(notification) => {
                let skipped = drain(&mut receiver);
                debug!(
                    match_id = %match_id,
                    kind = ?notification.kind,
                    skipped,
                    "store change received"
                );
            }
            Err(RecvError::Lagged(missed)) => {
                debug!(match_id = %match_id, missed, "change feed lagged; refreshing");
            }
            Err(RecvError::Closed) => break,
        }

        if let Err(err) = refresh_slot(&state, store.as_ref(), &slot).await {
            warn!(match_id = %match_id, error = %err, "failed to refresh match after store change");
        }
    }

    slot.release_watch();
    info!(match_id = %match_id, "match watcher stopped");
}

/// Discard notifications already queued and return how many were dropped.
fn drain(receiver: &mut Receiver<ChangeNotification>) -> usize {
    let mut skipped = 0;
    loop {
        match receiver.try_recv() {
            Ok(_) => skipped += 1,
            Err(TryRecvError::Lagged(missed)) => {
                skipped += usize::try_from(missed).unwrap_or(usize::MAX)
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return skipped,
        }
    }
}

async fn refresh_slot(
    state: &SharedState,
    store: &dyn BallEventStore,
    slot: &MatchSlot,
) -> Result<(), ServiceError> {
    let mut engine = slot.engine().lock().await;
    let (changed, completed) = scoring_service::reload(state, store, &mut engine).await?;
    if changed {
        sse_events::broadcast_progress(slot, &engine, completed);
    }
    Ok(())
}
