use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        matches::{
            CreateMatchRequest, FlipTossRequest, MatchListItem, MatchSummary, TossRequest,
            TossResponse,
        },
        scoring::{MatchViewResponse, PromptResponse, SubmitBallRequest, SubmitOutcome, UndoOutcome},
    },
    error::AppError,
    services::{match_service, scoring_service},
    state::SharedState,
};

/// Routes handling match setup and live scoring.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches", post(create_match).get(list_matches))
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/toss", post(record_toss))
        .route("/matches/{id}/toss/flip", post(flip_toss))
        .route("/matches/{id}/balls", post(submit_ball))
        .route("/matches/{id}/balls/last", delete(undo_last_ball))
        .route("/matches/{id}/innings/second", post(start_second_innings))
        .route("/matches/{id}/view", get(match_view))
        .route("/matches/{id}/prompt", get(required_prompt))
        .route("/matches/{id}/refresh", post(refresh))
}

/// Set up a new match and persist it.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "matches",
    request_body = CreateMatchRequest,
    responses(
        (status = 200, description = "Match created", body = MatchSummary),
        (status = 400, description = "Invalid setup"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    Json(payload): Json<CreateMatchRequest>,
) -> Result<Json<MatchSummary>, AppError> {
    payload.validate()?;
    let summary = match_service::create_match(&state, payload).await?;
    Ok(Json(summary))
}

/// List stored matches.
#[utoipa::path(
    get,
    path = "/matches",
    tag = "matches",
    responses(
        (status = 200, description = "Stored matches", body = [MatchListItem])
    )
)]
pub async fn list_matches(
    State(state): State<SharedState>,
) -> Result<Json<Vec<MatchListItem>>, AppError> {
    let matches = match_service::list_matches(&state).await?;
    Ok(Json(matches))
}

#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match summary", body = MatchSummary),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let summary = match_service::get_match(&state, id).await?;
    Ok(Json(summary))
}

/// Record the toss and open the first innings.
#[utoipa::path(
    post,
    path = "/matches/{id}/toss",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = TossRequest,
    responses(
        (status = 200, description = "Toss recorded", body = TossResponse),
        (status = 400, description = "Team not part of the match"),
        (status = 409, description = "Toss already recorded")
    )
)]
pub async fn record_toss(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TossRequest>,
) -> Result<Json<TossResponse>, AppError> {
    let response = match_service::record_toss(&state, id, payload).await?;
    Ok(Json(response))
}

/// Flip the coin for the calling side and record the toss.
#[utoipa::path(
    post,
    path = "/matches/{id}/toss/flip",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = FlipTossRequest,
    responses(
        (status = 200, description = "Coin flipped and toss recorded", body = TossResponse),
        (status = 409, description = "Toss already recorded")
    )
)]
pub async fn flip_toss(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FlipTossRequest>,
) -> Result<Json<TossResponse>, AppError> {
    let response = match_service::flip_toss(&state, id, payload).await?;
    Ok(Json(response))
}

/// Submit the next delivery. Refused deliveries answer 200 with `accepted = false`.
#[utoipa::path(
    post,
    path = "/matches/{id}/balls",
    tag = "scoring",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = SubmitBallRequest,
    responses(
        (status = 200, description = "Submission outcome", body = SubmitOutcome),
        (status = 409, description = "Concurrent scorers kept conflicting"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn submit_ball(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitBallRequest>,
) -> Result<Json<SubmitOutcome>, AppError> {
    let outcome = scoring_service::submit_ball(&state, id, payload).await?;
    Ok(Json(outcome))
}

/// Remove the latest delivery.
#[utoipa::path(
    delete,
    path = "/matches/{id}/balls/last",
    tag = "scoring",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Undo outcome", body = UndoOutcome),
        (status = 409, description = "Latest ball changed meanwhile")
    )
)]
pub async fn undo_last_ball(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UndoOutcome>, AppError> {
    let outcome = scoring_service::undo_last_ball(&state, id).await?;
    Ok(Json(outcome))
}

/// Acknowledge the innings break and start the chase.
#[utoipa::path(
    post,
    path = "/matches/{id}/innings/second",
    tag = "scoring",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Chase started", body = MatchViewResponse),
        (status = 409, description = "Match is not at the innings break")
    )
)]
pub async fn start_second_innings(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchViewResponse>, AppError> {
    let view = scoring_service::start_second_innings(&state, id).await?;
    Ok(Json(view))
}

#[utoipa::path(
    get,
    path = "/matches/{id}/view",
    tag = "scoring",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Derived match view", body = MatchViewResponse)
    )
)]
pub async fn match_view(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchViewResponse>, AppError> {
    let view = scoring_service::match_view(&state, id).await?;
    Ok(Json(view))
}

#[utoipa::path(
    get,
    path = "/matches/{id}/prompt",
    tag = "scoring",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Prompt to resolve before the next ball", body = PromptResponse)
    )
)]
pub async fn required_prompt(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PromptResponse>, AppError> {
    let prompt = scoring_service::required_prompt(&state, id).await?;
    Ok(Json(prompt))
}

/// Drop local state and replay every stored ball.
#[utoipa::path(
    post,
    path = "/matches/{id}/refresh",
    tag = "scoring",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Refreshed match view", body = MatchViewResponse)
    )
)]
pub async fn refresh(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchViewResponse>, AppError> {
    let view = scoring_service::refresh(&state, id).await?;
    Ok(Json(view))
}
