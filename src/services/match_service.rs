use tracing::info;

use crate::{
    dto::{
        matches::{
            CreateMatchRequest, FlipTossRequest, MatchListItem, MatchSummary, TossRequest,
            TossResponse,
        },
        phase::VisibleMatchPhase,
    },
    error::ServiceError,
    services::{realtime, scoring_service, sse_events},
    state::{
        MatchSlot, SharedState,
        fixture::{CoinFace, Fixture, MatchId, MatchStatus, Toss, flip_coin},
        scoring::ScoringEngine,
    },
};

/// Validate the setup of a new match and persist it.
pub async fn create_match(
    state: &SharedState,
    request: CreateMatchRequest,
) -> Result<MatchSummary, ServiceError> {
    let CreateMatchRequest {
        name,
        team_a,
        team_b,
        overs_per_innings,
    } = request;

    let fixture = Fixture::new(
        name.trim().to_string(),
        team_a.into(),
        team_b.into(),
        overs_per_innings,
        state.config().bowler_over_cap,
    )?;

    let store = state.require_store().await?;
    state
        .with_store_timeout(store.save_match(fixture.to_entity(MatchStatus::AwaitingToss)))
        .await?;

    let id = fixture.id;
    info!(match_id = %id, overs = overs_per_innings, "match created");

    let slot = state.insert_slot(id, ScoringEngine::new(fixture));
    realtime::ensure_watcher(state, &slot, id);
    let engine = slot.engine().lock().await;
    Ok(MatchSummary::from(&*engine))
}

/// List stored matches, oldest first.
pub async fn list_matches(state: &SharedState) -> Result<Vec<MatchListItem>, ServiceError> {
    let store = state.require_store().await?;
    let matches = state.with_store_timeout(store.list_matches()).await?;
    Ok(matches.into_iter().map(Into::into).collect())
}

/// Summary of one match.
pub async fn get_match(state: &SharedState, id: MatchId) -> Result<MatchSummary, ServiceError> {
    let slot = scoring_service::load_slot(state, id).await?;
    let engine = slot.engine().lock().await;
    Ok(MatchSummary::from(&*engine))
}

/// Record a toss decided off the app.
pub async fn record_toss(
    state: &SharedState,
    id: MatchId,
    request: TossRequest,
) -> Result<TossResponse, ServiceError> {
    let slot = scoring_service::load_slot(state, id).await?;
    apply_toss(state, &slot, request.into(), None).await
}

/// Flip the coin for the caller and record the toss for whichever side wins.
pub async fn flip_toss(
    state: &SharedState,
    id: MatchId,
    request: FlipTossRequest,
) -> Result<TossResponse, ServiceError> {
    let slot = scoring_service::load_slot(state, id).await?;

    let (landed, winner) = {
        let engine = slot.engine().lock().await;
        let fixture = engine.fixture();
        fixture.ensure_team(request.caller_id)?;
        let opponent = fixture.opponent(request.caller_id).id;
        let mut rng = rand::rng();
        flip_coin(&mut rng, request.caller_id, request.call, opponent)
    };
    info!(
        match_id = %id,
        landed = ?landed,
        winner = %winner,
        "coin flipped"
    );

    let toss = Toss {
        winner,
        decision: request.decision,
    };
    apply_toss(state, &slot, toss, Some(landed)).await
}

async fn apply_toss(
    state: &SharedState,
    slot: &MatchSlot,
    toss: Toss,
    landed: Option<CoinFace>,
) -> Result<TossResponse, ServiceError> {
    let mut engine = slot.engine().lock().await;

    let mut next = engine.clone();
    let phase = next.record_toss(toss)?;

    let store = state.require_store().await?;
    state
        .with_store_timeout(store.save_match(next.fixture().to_entity(MatchStatus::InProgress)))
        .await?;
    *engine = next;

    let batting_team_id = engine
        .fixture()
        .opening_sides()
        .map(|(batting, _)| batting)
        .unwrap_or(toss.winner);
    info!(match_id = %engine.fixture().id, batting = %batting_team_id, "toss recorded");
    sse_events::broadcast_progress(slot, &engine, false);

    Ok(TossResponse {
        winner_id: toss.winner,
        decision: toss.decision,
        landed,
        batting_team_id,
        phase: VisibleMatchPhase::from(phase),
    })
}
