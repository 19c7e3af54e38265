use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{
    matches::ResultSummary,
    phase::PromptDto,
    scoring::{MatchViewResponse, PromptResponse},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE `event:` field.
    pub event: Option<String>,
    /// Serialised JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Match the stream follows.
    pub match_id: Uuid,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
    /// Current projection, so late joiners do not wait for the next ball.
    pub view: MatchViewResponse,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast after every accepted ball, undo or refresh.
pub struct MatchViewEvent(pub MatchViewResponse);

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast when the prompt the scorer must resolve changes.
pub struct MatchPromptEvent(pub PromptResponse);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once when the result is decided.
pub struct MatchCompletedEvent {
    pub match_id: Uuid,
    pub result: ResultSummary,
    pub prompt: PromptDto,
}
