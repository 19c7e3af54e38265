use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    dao::{
        ball_store::BallEventStore,
        models::{BallEventEntity, MatchStatusEntity, MatchStatusUpdate},
        storage::StorageError,
    },
    dto::scoring::{
        MatchViewResponse, PromptResponse, SubmitBallRequest, SubmitOutcome, UndoOutcome,
    },
    error::ServiceError,
    services::{realtime, sse_events},
    state::{
        MatchSlot, SharedState,
        ball::{BallEvent, BallSelection},
        fixture::{Fixture, MatchId, MatchStatus},
        scoring::{PlanError, ReplayError, ScoringEngine},
        state_machine::MatchPhase,
    },
};

/// Return the slot of a match, loading and replaying it from the store on first access.
pub async fn load_slot(state: &SharedState, id: MatchId) -> Result<Arc<MatchSlot>, ServiceError> {
    if let Some(slot) = state.slot(id) {
        slot.touch();
        realtime::ensure_watcher(state, &slot, id);
        return Ok(slot);
    }

    let store = state.require_store().await?;
    let engine = fetch_engine(state, store.as_ref(), id, false).await?;
    debug!(match_id = %id, head = engine.head(), "match loaded from store");

    let slot = state.insert_slot(id, engine);
    slot.touch();
    realtime::ensure_watcher(state, &slot, id);
    Ok(slot)
}

/// Fetch the fixture and every ball of a match and rebuild its engine.
pub(crate) async fn fetch_engine(
    state: &SharedState,
    store: &dyn BallEventStore,
    id: MatchId,
    second_innings_opened: bool,
) -> Result<ScoringEngine, ServiceError> {
    let Some(entity) = state.with_store_timeout(store.find_match(id)).await? else {
        return Err(ServiceError::NotFound(format!("match `{id}` not found")));
    };
    let stored_status = entity.status;
    let fixture = Fixture::try_from(entity)
        .map_err(|err| ServiceError::Unavailable(StorageError::Corrupt(err.to_string())))?;

    let rows = state.with_store_timeout(store.list_events(id)).await?;
    let events = rows
        .into_iter()
        .map(BallEvent::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ReplayError::from)?;

    let engine = ScoringEngine::replay(fixture, events, second_innings_opened)?;
    if engine.phase() == MatchPhase::Completed && stored_status != MatchStatusEntity::Completed {
        info!(match_id = %id, "stored match lacks its result; saving it again");
        // Failure is logged; the next load retries.
        let _ = persist_result(state, store, &engine).await;
    }
    Ok(engine)
}

/// Replace the engine with a fresh replay of the stored events.
///
/// Returns whether anything visible changed, and whether the match completed with it.
pub(crate) async fn reload(
    state: &SharedState,
    store: &dyn BallEventStore,
    engine: &mut ScoringEngine,
) -> Result<(bool, bool), ServiceError> {
    let id = engine.fixture().id;
    let fresh = fetch_engine(state, store, id, engine.second_innings_opened()).await?;

    let changed = fresh.events() != engine.events()
        || fresh.phase() != engine.phase()
        || fresh.fixture() != engine.fixture();
    let completed = fresh.phase() == MatchPhase::Completed && engine.phase() != MatchPhase::Completed;
    *engine = fresh;
    Ok((changed, completed))
}

/// Validate and record the next delivery.
///
/// Rule violations come back as a refused [`SubmitOutcome`]. Write conflicts with
/// another scorer trigger a refetch and a new attempt, up to the configured number
/// of retries.
pub async fn submit_ball(
    state: &SharedState,
    id: MatchId,
    request: SubmitBallRequest,
) -> Result<SubmitOutcome, ServiceError> {
    let slot = load_slot(state, id).await?;
    let mut engine = slot.engine().lock().await;

    let selection = match BallSelection::try_from(request) {
        Ok(selection) => selection,
        Err(rejection) => {
            return Ok(SubmitOutcome::rejected(&rejection, engine.required_prompt()));
        }
    };

    let store = state.require_store().await?;
    let retries = state.config().submit_retries;
    let mut attempt = 0;

    loop {
        let plan = match engine.plan_ball(&selection) {
            Ok(plan) => plan,
            Err(PlanError::Rejected(rejection)) => {
                debug!(match_id = %id, reason = %rejection, "delivery refused");
                return Ok(SubmitOutcome::rejected(&rejection, engine.required_prompt()));
            }
            Err(err) => return Err(err.into()),
        };

        let sequence = plan.event.sequence;
        let expected_head = sequence.saturating_sub(1);
        let row = BallEventEntity::from(plan.event.clone());

        match state
            .with_store_timeout(store.append_event(row, expected_head))
            .await
        {
            Ok(stored) => {
                let stored = match BallEvent::try_from(stored) {
                    Ok(stored) => stored,
                    Err(err) => {
                        engine.abort(plan.id)?;
                        return Err(ReplayError::from(err).into());
                    }
                };
                engine.confirm(plan.id, stored.clone())?;
                info!(match_id = %id, sequence, "ball recorded");

                let completed = plan.phase == MatchPhase::Completed;
                let result_saved =
                    !completed || persist_result(state, store.as_ref(), &engine).await.is_ok();
                sse_events::broadcast_progress(&slot, &engine, completed);

                let outcome = SubmitOutcome::accepted(&stored, engine.required_prompt());
                if !result_saved {
                    return Ok(outcome.with_warning(
                        "the match result could not be saved; it is saved again on the next refresh",
                    ));
                }
                return Ok(outcome);
            }
            Err(ServiceError::Conflict(message)) if attempt < retries => {
                engine.abort(plan.id)?;
                attempt += 1;
                warn!(
                    match_id = %id,
                    sequence,
                    attempt,
                    error = %message,
                    "ball write conflicted; refetching before retry"
                );
                let (changed, completed) = reload(state, store.as_ref(), &mut engine).await?;
                if changed {
                    sse_events::broadcast_progress(&slot, &engine, completed);
                }
            }
            Err(err) => {
                engine.abort(plan.id)?;
                warn!(match_id = %id, sequence, error = %err, "ball write failed");
                return Err(err);
            }
        }
    }
}

/// Store the status and result of a completed match.
async fn persist_result(
    state: &SharedState,
    store: &dyn BallEventStore,
    engine: &ScoringEngine,
) -> Result<(), ServiceError> {
    let match_id = engine.fixture().id;
    let update = MatchStatusUpdate {
        match_id,
        status: MatchStatus::Completed.into(),
        result_text: engine.result().map(|result| result.text.clone()),
        winner_id: engine.result().and_then(|result| result.winner),
    };
    match state
        .with_store_timeout(store.update_match_status(update))
        .await
    {
        Ok(()) => {
            info!(match_id = %match_id, "match completed");
            Ok(())
        }
        Err(err) => {
            warn!(match_id = %match_id, error = %err, "failed to persist match result");
            Err(err)
        }
    }
}

/// Remove the latest ball.
pub async fn undo_last_ball(state: &SharedState, id: MatchId) -> Result<UndoOutcome, ServiceError> {
    let slot = load_slot(state, id).await?;
    let mut engine = slot.engine().lock().await;

    let head = match engine.undo_candidate() {
        Ok(head) => head.clone(),
        Err(rejection) => {
            return Ok(UndoOutcome::refused(&rejection, engine.required_prompt()));
        }
    };

    let store = state.require_store().await?;
    match state
        .with_store_timeout(store.delete_event(id, head.id, head.sequence))
        .await
    {
        Ok(()) => {
            *engine = engine.without_head()?;
            info!(match_id = %id, sequence = head.sequence, "ball undone");
            sse_events::broadcast_progress(&slot, &engine, false);
            Ok(UndoOutcome::undone(&head, engine.required_prompt()))
        }
        Err(ServiceError::Conflict(message)) => {
            warn!(match_id = %id, sequence = head.sequence, error = %message, "undo conflicted");
            let (changed, completed) = reload(state, store.as_ref(), &mut engine).await?;
            if changed {
                sse_events::broadcast_progress(&slot, &engine, completed);
            }
            Err(ServiceError::Conflict(
                "the latest ball changed; review the score before undoing".into(),
            ))
        }
        Err(err) => Err(err),
    }
}

/// Acknowledge the innings break and open the chase.
pub async fn start_second_innings(
    state: &SharedState,
    id: MatchId,
) -> Result<MatchViewResponse, ServiceError> {
    let slot = load_slot(state, id).await?;
    let mut engine = slot.engine().lock().await;
    engine.start_second_innings()?;
    info!(match_id = %id, "second innings started");
    sse_events::broadcast_progress(&slot, &engine, false);
    Ok(sse_events::view_response(&engine))
}

/// Derived projection of the match.
pub async fn match_view(state: &SharedState, id: MatchId) -> Result<MatchViewResponse, ServiceError> {
    let slot = load_slot(state, id).await?;
    let engine = slot.engine().lock().await;
    Ok(sse_events::view_response(&engine))
}

/// Prompt the scorer must resolve next, with its candidates.
pub async fn required_prompt(
    state: &SharedState,
    id: MatchId,
) -> Result<PromptResponse, ServiceError> {
    let slot = load_slot(state, id).await?;
    let engine = slot.engine().lock().await;
    Ok(sse_events::prompt_response(&engine))
}

/// Refetch every ball from the store and replay.
pub async fn refresh(state: &SharedState, id: MatchId) -> Result<MatchViewResponse, ServiceError> {
    let slot = load_slot(state, id).await?;
    let store = state.require_store().await?;
    let mut engine = slot.engine().lock().await;
    let (changed, completed) = reload(state, store.as_ref(), &mut engine).await?;
    if changed {
        sse_events::broadcast_progress(&slot, &engine, completed);
    }
    Ok(sse_events::view_response(&engine))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use futures::future::BoxFuture;
    use tokio::sync::broadcast;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            ball_store::{ChangeNotification, memory::MemoryBallStore},
            models::{MatchEntity, MatchListItemEntity},
            storage::StorageResult,
        },
        dto::{
            matches::{CreateMatchRequest, PlayerInput, TeamInput, TossRequest},
            phase::PromptDto,
            scoring::{OutcomeInput, WicketInput, WicketKindDto},
        },
        services::match_service,
        state::{AppState, ball::Delivery, fixture::TossDecision},
    };

    struct Setup {
        state: SharedState,
        store: Arc<MemoryBallStore>,
        match_id: MatchId,
        lions: Uuid,
        batting: Vec<Uuid>,
        bowling: Vec<Uuid>,
    }

    fn team(name: &str, size: usize) -> TeamInput {
        TeamInput {
            id: Some(Uuid::new_v4()),
            name: name.into(),
            players: (0..size)
                .map(|index| PlayerInput {
                    id: Some(Uuid::new_v4()),
                    name: format!("{name} {index}"),
                })
                .collect(),
        }
    }

    async fn setup(players: usize, overs: u16) -> Setup {
        let store = Arc::new(MemoryBallStore::default());
        setup_with(store.clone(), store, players, overs).await
    }

    /// Start a match whose state talks to `backend`, which shares its data with `store`.
    async fn setup_with(
        store: Arc<MemoryBallStore>,
        backend: Arc<dyn BallEventStore>,
        players: usize,
        overs: u16,
    ) -> Setup {
        let state = AppState::new(AppConfig::default());
        state.set_store(backend).await;

        let team_a = team("Lions", players);
        let team_b = team("Tigers", players);
        let batting: Vec<Uuid> = team_a.players.iter().filter_map(|p| p.id).collect();
        let bowling: Vec<Uuid> = team_b.players.iter().filter_map(|p| p.id).collect();
        let winner = team_a.id.unwrap_or_default();

        let summary = match_service::create_match(
            &state,
            CreateMatchRequest {
                name: "Sunday league".into(),
                team_a,
                team_b,
                overs_per_innings: overs,
            },
        )
        .await
        .unwrap();
        match_service::record_toss(
            &state,
            summary.id,
            TossRequest {
                winner_id: winner,
                decision: TossDecision::Bat,
            },
        )
        .await
        .unwrap();

        Setup {
            state,
            store,
            match_id: summary.id,
            lions: winner,
            batting,
            bowling,
        }
    }

    fn ball(striker: Uuid, non_striker: Uuid, bowler: Uuid, runs: u8) -> SubmitBallRequest {
        SubmitBallRequest {
            striker_id: Some(striker),
            non_striker_id: Some(non_striker),
            bowler_id: Some(bowler),
            outcome: Some(OutcomeInput {
                runs,
                ..OutcomeInput::default()
            }),
        }
    }

    #[tokio::test]
    async fn accepted_ball_is_persisted_and_scored() {
        let setup = setup(3, 2).await;
        let outcome = submit_ball(
            &setup.state,
            setup.match_id,
            ball(setup.batting[0], setup.batting[1], setup.bowling[0], 4),
        )
        .await
        .unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.prompt, PromptDto::None);

        let rows = setup.store.list_events(setup.match_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sequence, 1);

        let view = match_view(&setup.state, setup.match_id).await.unwrap();
        assert_eq!(view.innings[0].total, 4);
        assert_eq!(view.head, 1);
    }

    #[tokio::test]
    async fn rule_violation_is_reported_not_raised() {
        let setup = setup(3, 2).await;
        let outcome = submit_ball(
            &setup.state,
            setup.match_id,
            ball(setup.batting[0], setup.batting[0], setup.bowling[0], 1),
        )
        .await
        .unwrap();
        assert!(!outcome.accepted);
        assert!(outcome.reason.is_some());
        assert!(
            setup
                .store
                .list_events(setup.match_id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn conflicting_writer_triggers_refetch_and_retry() {
        let setup = setup(3, 2).await;
        // Warm the slot so the engine is stale once the other scorer writes.
        match_view(&setup.state, setup.match_id).await.unwrap();

        let entity = setup
            .store
            .find_match(setup.match_id)
            .await
            .unwrap()
            .unwrap();
        let other = ScoringEngine::replay(Fixture::try_from(entity).unwrap(), Vec::new(), false)
            .unwrap();
        let foreign = other
            .admit(&BallSelection {
                striker: Some(setup.batting[0]),
                non_striker: Some(setup.batting[1]),
                bowler: Some(setup.bowling[0]),
                delivery: Some(Delivery::Runs { runs: 1 }),
            })
            .unwrap();
        setup
            .store
            .append_event(foreign.into(), 0)
            .await
            .unwrap();

        // After the single the batsmen have crossed.
        let outcome = submit_ball(
            &setup.state,
            setup.match_id,
            ball(setup.batting[1], setup.batting[0], setup.bowling[0], 2),
        )
        .await
        .unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.ball.map(|ball| ball.sequence), Some(2));

        let view = match_view(&setup.state, setup.match_id).await.unwrap();
        assert_eq!(view.innings[0].total, 3);
    }

    #[tokio::test]
    async fn undo_without_balls_is_refused() {
        let setup = setup(3, 2).await;
        let outcome = undo_last_ball(&setup.state, setup.match_id).await.unwrap();
        assert!(!outcome.undone);
        assert!(outcome.reason.is_some());
    }

    #[tokio::test]
    async fn undo_removes_the_head_ball() {
        let setup = setup(3, 2).await;
        submit_ball(
            &setup.state,
            setup.match_id,
            ball(setup.batting[0], setup.batting[1], setup.bowling[0], 6),
        )
        .await
        .unwrap();

        let outcome = undo_last_ball(&setup.state, setup.match_id).await.unwrap();
        assert!(outcome.undone);
        assert_eq!(outcome.prompt, PromptDto::SelectOpeners);
        assert!(
            setup
                .store
                .list_events(setup.match_id)
                .await
                .unwrap()
                .is_empty()
        );
        let view = match_view(&setup.state, setup.match_id).await.unwrap();
        assert_eq!(view.head, 0);
    }

    fn bowled(striker: Uuid, non_striker: Uuid, bowler: Uuid) -> SubmitBallRequest {
        SubmitBallRequest {
            striker_id: Some(striker),
            non_striker_id: Some(non_striker),
            bowler_id: Some(bowler),
            outcome: Some(OutcomeInput {
                wicket: Some(WicketInput {
                    kind: WicketKindDto::Bowled,
                    dismissed_id: striker,
                    fielder_id: None,
                }),
                ..OutcomeInput::default()
            }),
        }
    }

    /// Memory store that refuses status updates while `fail_status` is set.
    struct FlakyStatusStore {
        inner: MemoryBallStore,
        fail_status: AtomicBool,
    }

    impl BallEventStore for FlakyStatusStore {
        fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_match(entity)
        }

        fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
            self.inner.find_match(id)
        }

        fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchListItemEntity>>> {
            self.inner.list_matches()
        }

        fn update_match_status(
            &self,
            update: MatchStatusUpdate,
        ) -> BoxFuture<'static, StorageResult<()>> {
            if self.fail_status.load(Ordering::SeqCst) {
                return Box::pin(async {
                    Err(StorageError::unavailable(
                        "status update refused".into(),
                        std::io::Error::other("connection reset"),
                    ))
                });
            }
            self.inner.update_match_status(update)
        }

        fn list_events(
            &self,
            match_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<BallEventEntity>>> {
            self.inner.list_events(match_id)
        }

        fn append_event(
            &self,
            event: BallEventEntity,
            expected_head: u64,
        ) -> BoxFuture<'static, StorageResult<BallEventEntity>> {
            self.inner.append_event(event, expected_head)
        }

        fn delete_event(
            &self,
            match_id: Uuid,
            event_id: Uuid,
            expected_head: u64,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.delete_event(match_id, event_id, expected_head)
        }

        fn subscribe(&self, match_id: Uuid) -> broadcast::Receiver<ChangeNotification> {
            self.inner.subscribe(match_id)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[tokio::test]
    async fn completed_match_persists_its_result() {
        // Two players a side: the first wicket ends each innings.
        let setup = setup(2, 1).await;

        let outcome = submit_ball(
            &setup.state,
            setup.match_id,
            ball(setup.batting[0], setup.batting[1], setup.bowling[0], 2),
        )
        .await
        .unwrap();
        assert!(outcome.accepted);
        let outcome = submit_ball(
            &setup.state,
            setup.match_id,
            bowled(setup.batting[0], setup.batting[1], setup.bowling[0]),
        )
        .await
        .unwrap();
        assert_eq!(outcome.prompt, PromptDto::InningsComplete);

        start_second_innings(&setup.state, setup.match_id)
            .await
            .unwrap();
        let outcome = submit_ball(
            &setup.state,
            setup.match_id,
            bowled(setup.bowling[0], setup.bowling[1], setup.batting[0]),
        )
        .await
        .unwrap();
        assert_eq!(outcome.prompt, PromptDto::MatchComplete);

        let entity = setup
            .store
            .find_match(setup.match_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entity.status, MatchStatusEntity::Completed);
        assert_eq!(entity.result_text.as_deref(), Some("Lions won by 2 runs"));
        assert_eq!(entity.winner_id, Some(setup.lions));
    }

    #[tokio::test]
    async fn unsaved_result_is_reported_and_saved_on_refresh() {
        let store = Arc::new(MemoryBallStore::default());
        let flaky = Arc::new(FlakyStatusStore {
            inner: store.as_ref().clone(),
            fail_status: AtomicBool::new(false),
        });
        let setup = setup_with(store, flaky.clone(), 2, 1).await;

        submit_ball(
            &setup.state,
            setup.match_id,
            ball(setup.batting[0], setup.batting[1], setup.bowling[0], 2),
        )
        .await
        .unwrap();
        submit_ball(
            &setup.state,
            setup.match_id,
            bowled(setup.batting[0], setup.batting[1], setup.bowling[0]),
        )
        .await
        .unwrap();
        start_second_innings(&setup.state, setup.match_id)
            .await
            .unwrap();

        flaky.fail_status.store(true, Ordering::SeqCst);
        let outcome = submit_ball(
            &setup.state,
            setup.match_id,
            bowled(setup.bowling[0], setup.bowling[1], setup.batting[0]),
        )
        .await
        .unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.prompt, PromptDto::MatchComplete);
        assert!(outcome.warning.is_some());
        let entity = setup
            .store
            .find_match(setup.match_id)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(entity.status, MatchStatusEntity::Completed);

        flaky.fail_status.store(false, Ordering::SeqCst);
        refresh(&setup.state, setup.match_id).await.unwrap();
        let entity = setup
            .store
            .find_match(setup.match_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entity.status, MatchStatusEntity::Completed);
        assert_eq!(entity.result_text.as_deref(), Some("Lions won by 2 runs"));
    }

    #[tokio::test]
    async fn degraded_mode_refuses_unloaded_matches() {
        let state = AppState::new(AppConfig::default());
        let err = match_view(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let state = AppState::new(AppConfig {
            store_timeout: Duration::from_secs(1),
            ..AppConfig::default()
        });
        state.set_store(Arc::new(MemoryBallStore::default())).await;
        let err = match_view(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
