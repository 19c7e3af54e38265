use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        matches::ResultSummary,
        scoring::{MatchViewResponse, PromptResponse},
        sse::{MatchCompletedEvent, MatchPromptEvent, MatchViewEvent, ServerEvent},
    },
    state::{MatchSlot, scoring::ScoringEngine},
};

pub(crate) const EVENT_MATCH_VIEW: &str = "match.view";
pub(crate) const EVENT_MATCH_PROMPT: &str = "match.prompt";
pub(crate) const EVENT_MATCH_COMPLETED: &str = "match.completed";
pub(crate) const EVENT_HANDSHAKE: &str = "handshake";

/// Current projection of the match with fixture names attached.
pub fn view_response(engine: &ScoringEngine) -> MatchViewResponse {
    MatchViewResponse::new(&engine.view(), engine.fixture())
}

/// Current prompt with the candidates that resolve it.
pub fn prompt_response(engine: &ScoringEngine) -> PromptResponse {
    PromptResponse::new(
        engine.required_prompt(),
        &engine.batsman_candidates(),
        &engine.bowler_candidates(),
        engine.fixture(),
    )
}

/// Broadcast the derived view to the viewers of the match.
pub fn broadcast_view(slot: &MatchSlot, engine: &ScoringEngine) {
    let payload = MatchViewEvent(view_response(engine));
    send_match_event(slot, EVENT_MATCH_VIEW, &payload);
}

/// Broadcast the prompt the scorer must resolve next.
pub fn broadcast_prompt(slot: &MatchSlot, engine: &ScoringEngine) {
    let payload = MatchPromptEvent(prompt_response(engine));
    send_match_event(slot, EVENT_MATCH_PROMPT, &payload);
}

/// Broadcast the result once the match is decided. Does nothing before that.
pub fn broadcast_completed(slot: &MatchSlot, engine: &ScoringEngine) {
    let Some(result) = engine.result() else {
        return;
    };
    let payload = MatchCompletedEvent {
        match_id: engine.fixture().id,
        result: ResultSummary::from(result),
        prompt: engine.required_prompt().into(),
    };
    send_match_event(slot, EVENT_MATCH_COMPLETED, &payload);
}

/// Broadcast view and prompt, plus the result when the match just finished.
pub fn broadcast_progress(slot: &MatchSlot, engine: &ScoringEngine, just_completed: bool) {
    broadcast_view(slot, engine);
    broadcast_prompt(slot, engine);
    if just_completed {
        broadcast_completed(slot, engine);
    }
}

/// Serialise a payload into a named SSE event.
pub(crate) fn encode(event: &str, payload: &impl Serialize) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize match SSE payload");
            None
        }
    }
}

fn send_match_event(slot: &MatchSlot, event: &str, payload: &impl Serialize) {
    if let Some(event) = encode(event, payload) {
        slot.sse().broadcast(event);
    }
}
