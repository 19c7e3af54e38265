use tokio::sync::broadcast;
use tracing::trace;

use crate::{dto::sse::ServerEvent, state::fixture::MatchId};

/// Fan-out of one match's events to its SSE viewers.
pub struct SseHub {
    match_id: MatchId,
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Hub buffering up to `capacity` events per lagging viewer.
    pub fn new(match_id: MatchId, capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { match_id, sender }
    }

    /// Join the stream; only events sent afterwards are received.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Publish to every viewer. Nobody watching is not an error.
    pub fn broadcast(&self, event: ServerEvent) {
        if self.sender.send(event).is_err() {
            trace!(match_id = %self.match_id, "no SSE viewer for match event");
        }
    }

    /// Viewers currently connected.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
