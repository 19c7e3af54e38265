use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use uuid::Uuid;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/matches/{id}/events",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses((status = 200, description = "Match SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream live view, prompt and completion events of a match.
pub async fn match_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, initial) = sse_service::subscribe_match(&state, id).await?;
    Ok(sse_service::to_sse_stream(receiver, initial, id))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/matches/{id}/events", get(match_stream))
}
