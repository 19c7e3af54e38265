use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the cricket scoring backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::match_stream,
        crate::routes::matches::create_match,
        crate::routes::matches::list_matches,
        crate::routes::matches::get_match,
        crate::routes::matches::record_toss,
        crate::routes::matches::flip_toss,
        crate::routes::matches::submit_ball,
        crate::routes::matches::undo_last_ball,
        crate::routes::matches::start_second_innings,
        crate::routes::matches::match_view,
        crate::routes::matches::required_prompt,
        crate::routes::matches::refresh,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matches::CreateMatchRequest,
            crate::dto::matches::TeamInput,
            crate::dto::matches::PlayerInput,
            crate::dto::matches::TossRequest,
            crate::dto::matches::FlipTossRequest,
            crate::dto::matches::TossResponse,
            crate::dto::matches::MatchSummary,
            crate::dto::matches::MatchListItem,
            crate::dto::matches::ResultSummary,
            crate::dto::phase::VisibleMatchPhase,
            crate::dto::phase::MatchStatusDto,
            crate::dto::phase::PromptDto,
            crate::dto::scoring::SubmitBallRequest,
            crate::dto::scoring::OutcomeInput,
            crate::dto::scoring::SubmitOutcome,
            crate::dto::scoring::UndoOutcome,
            crate::dto::scoring::BallSummary,
            crate::dto::scoring::MatchViewResponse,
            crate::dto::scoring::PromptResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::MatchCompletedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "matches", description = "Match setup and toss"),
        (name = "scoring", description = "Ball-by-ball scoring and derived views"),
    )
)]
pub struct ApiDoc;
