use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    services::{scoring_service, sse_events},
    state::{SharedState, fixture::MatchId},
};

/// Subscribe to the SSE stream of a match.
///
/// Returns the receiver plus the events every new client gets first: the
/// handshake and the current prompt.
pub async fn subscribe_match(
    state: &SharedState,
    match_id: MatchId,
) -> Result<(broadcast::Receiver<ServerEvent>, Vec<ServerEvent>), ServiceError> {
    let slot = scoring_service::load_slot(state, match_id).await?;
    let receiver = slot.sse().subscribe();

    let engine = slot.engine().lock().await;
    let handshake = Handshake {
        match_id,
        message: "match stream connected".to_string(),
        degraded: state.is_degraded(),
        view: sse_events::view_response(&engine),
    };
    let prompt = sse_events::prompt_response(&engine);

    let initial = [
        sse_events::encode(sse_events::EVENT_HANDSHAKE, &handshake),
        sse_events::encode(sse_events::EVENT_MATCH_PROMPT, &prompt),
    ]
    .into_iter()
    .flatten()
    .collect();

    info!(
        match_id = %match_id,
        viewers = slot.sse().subscriber_count(),
        "new match SSE connection"
    );
    Ok((receiver, initial))
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    initial: Vec<ServerEvent>,
    match_id: MatchId,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: replays the initial events, then reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(missed)) => {
                            // Skip lagged messages but keep the stream alive.
                            debug!(match_id = %match_id, missed, "SSE client lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(match_id = %match_id, "match SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::ball_store::{BallEventStore, memory::{MemoryBallStore, tests::match_entity}},
        state::AppState,
    };

    #[tokio::test]
    async fn new_clients_get_handshake_then_prompt() {
        let state = AppState::new(AppConfig::default());
        let store = Arc::new(MemoryBallStore::default());
        state.set_store(store.clone()).await;
        let entity = match_entity();
        store.save_match(entity.clone()).await.unwrap();

        let (_receiver, initial) = subscribe_match(&state, entity.id).await.unwrap();
        let names: Vec<_> = initial
            .iter()
            .map(|event| event.event.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["handshake", "match.prompt"]);
        assert!(initial[1].data.contains("record-toss"));
    }
}
