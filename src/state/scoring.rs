//! Live scoring engine: per-ball admission, crease progression and innings lifecycle.
//!
//! The engine owns the ordered event list of one match and keeps every derived
//! figure folded incrementally. A full replay rebuilds the same state from the
//! store after undo or a realtime refresh.

use std::time::SystemTime;

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::state::{
    ball::{BALLS_PER_OVER, BallEvent, BallSelection, Delivery, InningsNumber, MAX_RUNS_PER_BALL, RowError},
    fixture::{Fixture, FixtureError, PlayerId, Toss},
    result::{MatchResult, compute_result},
    state_machine::{InningsContext, InvalidTransition, MatchEvent, MatchPhase, MatchStateMachine},
    stats::{InningsTally, PlayerMatchState, Scorecard},
};

/// Prompt the scorer must resolve before play can continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Nothing mandatory.
    None,
    /// The toss has to be recorded.
    RecordToss,
    /// Opening batsmen and bowler have to be picked.
    SelectOpeners,
    /// The over is complete; a different bowler has to be picked.
    SelectBowler,
    /// A wicket fell; the incoming batsman has to be picked.
    SelectNewBatsman,
    /// The opening innings closed; the chase has to be started.
    InningsComplete,
    /// The match is over.
    MatchComplete,
}

/// Batsmen at the crease and the bowler of the current over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crease {
    /// Batsman facing the next delivery.
    pub striker: Option<PlayerId>,
    /// Batsman at the bowler's end.
    pub non_striker: Option<PlayerId>,
    /// Bowler of the unfinished over.
    pub bowler: Option<PlayerId>,
}

/// Why an innings is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InningsEnd {
    /// Only one batsman left not out.
    AllOut,
    /// Every legal ball of the innings has been bowled.
    OversComplete,
    /// The chasing side passed the target.
    TargetReached,
}

/// Reasons a delivery (or an undo) is refused. These are expected and recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Toss still missing.
    #[error("the toss has not been recorded")]
    TossPending,
    /// Innings over; the chase must be started first.
    #[error("the innings is complete; start the second innings")]
    InningsComplete,
    /// Match over.
    #[error("the match is complete")]
    MatchComplete,
    /// No striker selected.
    #[error("select a striker")]
    MissingStriker,
    /// No non-striker selected.
    #[error("select a non-striker")]
    MissingNonStriker,
    /// No bowler selected.
    #[error("select a bowler")]
    MissingBowler,
    /// Neither runs, extras nor wicket given.
    #[error("select the outcome of the delivery")]
    MissingOutcome,
    /// Wicket and extras given together.
    #[error("a wicket cannot be recorded on a wide or no ball")]
    AmbiguousOutcome,
    /// Same player at both ends.
    #[error("striker and non-striker must be different players")]
    SameBatsmen,
    /// Batsman from the wrong side.
    #[error("player `{0}` is not in the batting side")]
    NotInBattingSide(PlayerId),
    /// Bowler or fielder from the wrong side.
    #[error("player `{0}` is not in the bowling side")]
    NotInBowlingSide(PlayerId),
    /// Batsman already out.
    #[error("player `{0}` is already out")]
    AlreadyDismissed(PlayerId),
    /// A batsman not out at this end is replaced or the ends are swapped wrongly.
    #[error("player `{expected}` is batting at this end, not `{selected}`")]
    WrongEnd {
        /// Player named in the selection.
        selected: PlayerId,
        /// Player the crease holds at that end.
        expected: PlayerId,
    },
    /// Dismissed player is neither striker nor non-striker.
    #[error("player `{0}` is not at the crease")]
    DismissedNotAtCrease(PlayerId),
    /// Runs outside 0..=6.
    #[error("{0} runs cannot be scored off the bat from one ball")]
    InvalidRuns(u8),
    /// Extra conceding nothing.
    #[error("an extra must concede at least one run")]
    InvalidExtras,
    /// Bowler has used up their allocation.
    #[error("bowler `{bowler}` has already bowled {limit} overs; change the bowler")]
    BowlerOverLimit {
        /// Bowler refused.
        bowler: PlayerId,
        /// Overs allowed per bowler.
        limit: u16,
    },
    /// Bowler bowled the over that just finished.
    #[error("bowler `{0}` bowled the previous over; change the bowler")]
    ConsecutiveOvers(PlayerId),
    /// Undo with an empty event list.
    #[error("there is no ball to undo")]
    NothingToUndo,
    /// Another submission has not settled yet.
    #[error("a submission is already in flight")]
    SubmissionPending,
}

/// Errors that can occur when planning a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A delivery is already pending and must be confirmed or aborted.
    #[error("a delivery is already pending")]
    AlreadyPending,
    /// The delivery breaks a scoring rule.
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// The delivery could not be folded into the derived state.
    #[error(transparent)]
    Replay(#[from] ReplayError),
}

/// Errors that can occur when confirming a planned delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// No delivery is currently pending.
    #[error("no delivery is pending")]
    NoPending,
    /// Plan ID does not match the pending plan.
    #[error("pending delivery `{expected}` does not match `{got}`")]
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Errors that can occur when aborting a planned delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbortError {
    /// No delivery is currently pending.
    #[error("no delivery is pending")]
    NoPending,
    /// Plan ID does not match the pending plan.
    #[error("pending delivery `{expected}` does not match `{got}`")]
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Stored events that cannot be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    /// A ball exists although the toss was never recorded.
    #[error("ball `{0}` was recorded before the toss")]
    BeforeToss(Uuid),
    /// A ball belongs to an innings the match is not in.
    #[error("ball `{id}` belongs to the {innings:?} innings while the match is in {phase:?}")]
    OutOfPhase {
        /// Offending ball.
        id: Uuid,
        /// Innings stored on the ball.
        innings: InningsNumber,
        /// Phase the match was in.
        phase: MatchPhase,
    },
    /// A stored row is malformed.
    #[error(transparent)]
    Row(#[from] RowError),
    /// A lifecycle transition failed.
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Errors raised while recording the toss.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TossError {
    /// The toss names a team outside the fixture.
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    /// The toss was already recorded.
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Unique identifier for a planned delivery.
pub type PlanId = Uuid;

/// A delivery applied optimistically and awaiting store confirmation.
#[derive(Debug, Clone)]
pub struct PlannedBall {
    /// Identifier to confirm or abort with.
    pub id: PlanId,
    /// Event to persist.
    pub event: BallEvent,
    /// Phase after applying the delivery.
    pub phase: MatchPhase,
}

/// Scores and figures of one innings for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InningsSummary {
    /// Innings number.
    pub number: InningsNumber,
    /// Batting side.
    pub batting_team: Uuid,
    /// Running totals.
    pub tally: InningsTally,
}

/// Side-effect free projection of the match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchView {
    /// Match identifier.
    pub match_id: Uuid,
    /// Current phase.
    pub phase: MatchPhase,
    /// Started innings, opening innings first.
    pub innings: Vec<InningsSummary>,
    /// Sides of the current innings.
    pub current: Option<InningsContext>,
    /// Opening innings total, once fixed.
    pub target: Option<u32>,
    /// Runs the chasing side still needs to win.
    pub runs_needed: Option<u32>,
    /// Current run rate of the innings in play.
    pub run_rate: Option<f64>,
    /// Players at the crease.
    pub crease: Crease,
    /// Per-player figures in order of appearance.
    pub players: Vec<(PlayerId, PlayerMatchState)>,
    /// Result once decided.
    pub result: Option<MatchResult>,
    /// Mandatory prompt.
    pub prompt: Prompt,
    /// Sequence number of the latest ball.
    pub head: u64,
}

/// Derived state, checkpointed while a delivery is pending.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Progress {
    machine: MatchStateMachine,
    tallies: [InningsTally; 2],
    scorecard: Scorecard,
    crease: Crease,
    previous_over_bowler: Option<PlayerId>,
    head: u64,
}

impl Progress {
    fn new(fixture: &Fixture) -> Self {
        let mut machine = MatchStateMachine::new();
        if let Some((batting, bowling)) = fixture.opening_sides()
            && let Err(err) = machine.apply(MatchEvent::TossDecided { batting, bowling })
        {
            warn!(match_id = %fixture.id, error = %err, "failed to open the first innings");
        }

        Self {
            machine,
            tallies: Default::default(),
            scorecard: Scorecard::default(),
            crease: Crease::default(),
            previous_over_bowler: None,
            head: 0,
        }
    }

    /// Fold one event into tallies, figures and crease, then close the innings if due.
    fn fold(&mut self, fixture: &Fixture, event: &BallEvent) -> Result<(), ReplayError> {
        let tally = &mut self.tallies[event.innings.index()];
        tally.record(&event.delivery);
        let over_complete = event.delivery.is_legal() && tally.balls_in_over() == 0;

        self.scorecard.record(event);
        self.head = self.head.max(event.sequence);
        self.advance_crease(event, over_complete);
        self.close_innings_if_due(fixture)
    }

    fn advance_crease(&mut self, event: &BallEvent, over_complete: bool) {
        let delivery = &event.delivery;
        let mut striker = Some(event.striker);
        let mut non_striker = Some(event.non_striker);

        if delivery.is_legal() && delivery.runs() % 2 == 1 {
            std::mem::swap(&mut striker, &mut non_striker);
        }

        if let Some((_, dismissed)) = delivery.dismissal() {
            if striker == Some(dismissed) {
                striker = None;
            } else if non_striker == Some(dismissed) {
                non_striker = None;
            }
        }

        let mut bowler = Some(event.bowler);
        if over_complete {
            std::mem::swap(&mut striker, &mut non_striker);
            self.previous_over_bowler = Some(event.bowler);
            bowler = None;
        }

        self.crease = Crease {
            striker,
            non_striker,
            bowler,
        };
    }

    fn close_innings_if_due(&mut self, fixture: &Fixture) -> Result<(), ReplayError> {
        let Some(context) = self.machine.innings() else {
            return Ok(());
        };

        match self.machine.phase() {
            MatchPhase::FirstInnings => {
                let tally = &self.tallies[InningsNumber::First.index()];
                if innings_end(fixture, context, tally, None).is_some() {
                    let total = tally.total();
                    self.machine.apply(MatchEvent::InningsClosed { total })?;
                    self.clear_crease();
                }
            }
            MatchPhase::SecondInnings => {
                let target = self.machine.target().unwrap_or_default();
                let tally = &self.tallies[InningsNumber::Second.index()];
                if innings_end(fixture, context, tally, Some(target)).is_some() {
                    let chasing = fixture.side(context.batting);
                    let outcome = compute_result(
                        target,
                        tally.total(),
                        tally.wickets,
                        chasing.roster_size(),
                    );
                    let result =
                        MatchResult::describe(outcome, chasing, fixture.side(context.bowling));
                    self.machine.apply(MatchEvent::MatchDecided(result))?;
                    self.clear_crease();
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn clear_crease(&mut self) {
        self.crease = Crease::default();
        self.previous_over_bowler = None;
    }
}

/// Decide whether an innings is over given its tally.
pub fn innings_end(
    fixture: &Fixture,
    context: InningsContext,
    tally: &InningsTally,
    target: Option<u32>,
) -> Option<InningsEnd> {
    if target.is_some_and(|target| tally.total() > target) {
        return Some(InningsEnd::TargetReached);
    }

    let batting = fixture.side(context.batting);
    if usize::from(tally.wickets) >= batting.roster_size().saturating_sub(1) {
        return Some(InningsEnd::AllOut);
    }

    if tally.legal_balls >= u32::from(fixture.overs_per_innings) * BALLS_PER_OVER {
        return Some(InningsEnd::OversComplete);
    }

    None
}

#[derive(Debug, Clone)]
struct PendingBall {
    id: PlanId,
    checkpoint: Progress,
}

/// Scoring state of one match.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    fixture: Fixture,
    events: Vec<BallEvent>,
    progress: Progress,
    pending: Option<PendingBall>,
}

impl ScoringEngine {
    /// Create an engine with no deliveries, opening the first innings if the toss is known.
    pub fn new(fixture: Fixture) -> Self {
        let progress = Progress::new(&fixture);
        Self {
            fixture,
            events: Vec::new(),
            progress,
            pending: None,
        }
    }

    /// Rebuild an engine from the full stored event list.
    ///
    /// Stored events are authoritative: admission rules are not re-checked, only
    /// the lifecycle. `second_innings_opened` carries the break acknowledgement,
    /// which is not persisted, across refreshes.
    pub fn replay(
        fixture: Fixture,
        mut events: Vec<BallEvent>,
        second_innings_opened: bool,
    ) -> Result<Self, ReplayError> {
        events.sort_by_key(BallEvent::order_key);

        let mut engine = Self::new(fixture);
        for event in events {
            engine.replay_one(event)?;
        }

        if second_innings_opened && engine.phase() == MatchPhase::InningsBreak {
            engine
                .progress
                .machine
                .apply(MatchEvent::SecondInningsOpened)?;
        }

        Ok(engine)
    }

    fn replay_one(&mut self, event: BallEvent) -> Result<(), ReplayError> {
        match (self.phase(), event.innings) {
            (MatchPhase::AwaitingToss, _) => return Err(ReplayError::BeforeToss(event.id)),
            (MatchPhase::FirstInnings, InningsNumber::First)
            | (MatchPhase::SecondInnings, InningsNumber::Second) => {}
            (MatchPhase::InningsBreak, InningsNumber::Second) => {
                self.progress
                    .machine
                    .apply(MatchEvent::SecondInningsOpened)?;
            }
            (phase, innings) => {
                return Err(ReplayError::OutOfPhase {
                    id: event.id,
                    innings,
                    phase,
                });
            }
        }

        self.progress.fold(&self.fixture, &event)?;
        self.events.push(event);
        Ok(())
    }

    /// Fixture the engine scores.
    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    /// Accepted events in replay order.
    pub fn events(&self) -> &[BallEvent] {
        &self.events
    }

    /// Current phase.
    pub fn phase(&self) -> MatchPhase {
        self.progress.machine.phase()
    }

    /// Sides of the current innings.
    pub fn innings(&self) -> Option<InningsContext> {
        self.progress.machine.innings()
    }

    /// Running totals of an innings.
    pub fn tally(&self, innings: InningsNumber) -> &InningsTally {
        &self.progress.tallies[innings.index()]
    }

    /// Opening innings total once fixed.
    pub fn target(&self) -> Option<u32> {
        self.progress.machine.target()
    }

    /// Result once decided.
    pub fn result(&self) -> Option<&MatchResult> {
        self.progress.machine.result()
    }

    /// Players at the crease.
    pub fn crease(&self) -> Crease {
        self.progress.crease
    }

    /// Per-player figures.
    pub fn scorecard(&self) -> &Scorecard {
        &self.progress.scorecard
    }

    /// Sequence number of the latest ball (0 when none).
    pub fn head(&self) -> u64 {
        self.progress.head
    }

    /// Whether the chase has been started.
    pub fn second_innings_opened(&self) -> bool {
        matches!(
            self.phase(),
            MatchPhase::SecondInnings | MatchPhase::Completed
        )
    }

    /// Record the toss and open the first innings.
    pub fn record_toss(&mut self, toss: Toss) -> Result<MatchPhase, TossError> {
        self.fixture.ensure_team(toss.winner)?;

        let mut fixture = self.fixture.clone();
        fixture.toss = Some(toss);
        let (batting, bowling) = fixture
            .opening_sides()
            .ok_or(FixtureError::UnknownTeam(toss.winner))?;

        let phase = self
            .progress
            .machine
            .apply(MatchEvent::TossDecided { batting, bowling })?;
        self.fixture = fixture;
        Ok(phase)
    }

    /// Acknowledge the innings break and start the chase.
    pub fn start_second_innings(&mut self) -> Result<MatchPhase, InvalidTransition> {
        self.progress.machine.apply(MatchEvent::SecondInningsOpened)
    }

    /// Validate a selection against the scoring rules and build the event to record.
    pub fn admit(&self, selection: &BallSelection) -> Result<BallEvent, Rejection> {
        let context = match self.phase() {
            MatchPhase::AwaitingToss => return Err(Rejection::TossPending),
            MatchPhase::InningsBreak => return Err(Rejection::InningsComplete),
            MatchPhase::Completed => return Err(Rejection::MatchComplete),
            MatchPhase::FirstInnings | MatchPhase::SecondInnings => {
                self.innings().ok_or(Rejection::TossPending)?
            }
        };

        let tally = self.tally(context.number);
        if innings_end(&self.fixture, context, tally, self.target()).is_some() {
            return Err(Rejection::InningsComplete);
        }

        let striker = selection.striker.ok_or(Rejection::MissingStriker)?;
        let non_striker = selection.non_striker.ok_or(Rejection::MissingNonStriker)?;
        let bowler = selection.bowler.ok_or(Rejection::MissingBowler)?;
        let delivery = selection.delivery.ok_or(Rejection::MissingOutcome)?;

        if striker == non_striker {
            return Err(Rejection::SameBatsmen);
        }

        let batting = self.fixture.side(context.batting);
        let bowling = self.fixture.side(context.bowling);
        for batsman in [striker, non_striker] {
            if !batting.has_player(batsman) {
                return Err(Rejection::NotInBattingSide(batsman));
            }
            if self.progress.scorecard.is_dismissed(batsman) {
                return Err(Rejection::AlreadyDismissed(batsman));
            }
        }
        if !bowling.has_player(bowler) {
            return Err(Rejection::NotInBowlingSide(bowler));
        }
        self.check_crease(striker, non_striker)?;

        match delivery {
            Delivery::Runs { runs } if runs > MAX_RUNS_PER_BALL => {
                return Err(Rejection::InvalidRuns(runs));
            }
            Delivery::Extra { extras, runs, .. } => {
                if extras == 0 {
                    return Err(Rejection::InvalidExtras);
                }
                if runs > MAX_RUNS_PER_BALL {
                    return Err(Rejection::InvalidRuns(runs));
                }
            }
            Delivery::Wicket {
                dismissed,
                fielder,
                runs,
                ..
            } => {
                if dismissed != striker && dismissed != non_striker {
                    return Err(Rejection::DismissedNotAtCrease(dismissed));
                }
                if let Some(fielder) = fielder
                    && !bowling.has_player(fielder)
                {
                    return Err(Rejection::NotInBowlingSide(fielder));
                }
                if runs > MAX_RUNS_PER_BALL {
                    return Err(Rejection::InvalidRuns(runs));
                }
            }
            Delivery::Runs { .. } => {}
        }

        self.check_bowler(bowler, tally)?;

        let prior_legal = tally.legal_balls;
        let over = prior_legal / BALLS_PER_OVER;
        let in_over = prior_legal % BALLS_PER_OVER;
        let ball = if delivery.is_legal() {
            in_over + 1
        } else {
            in_over
        };

        Ok(BallEvent {
            id: Uuid::new_v4(),
            match_id: self.fixture.id,
            innings: context.number,
            batting_team: context.batting,
            sequence: self.head() + 1,
            over: u16::try_from(over).unwrap_or(u16::MAX),
            ball: u8::try_from(ball).unwrap_or(u8::MAX),
            striker,
            non_striker,
            bowler,
            delivery,
            recorded_at: SystemTime::now(),
        })
    }

    /// Occupied ends must keep their batsman. A vacant end takes any candidate, which the
    /// side and dismissal checks above already guarantee.
    fn check_crease(&self, striker: PlayerId, non_striker: PlayerId) -> Result<(), Rejection> {
        let crease = self.progress.crease;
        for (selected, held) in [(striker, crease.striker), (non_striker, crease.non_striker)] {
            if let Some(expected) = held
                && selected != expected
            {
                return Err(Rejection::WrongEnd { selected, expected });
            }
        }
        Ok(())
    }

    /// Bowler allocation and the no-consecutive-overs rule.
    fn check_bowler(&self, bowler: PlayerId, tally: &InningsTally) -> Result<(), Rejection> {
        let limit = self.fixture.bowler_over_limit;
        let finishing_over =
            tally.balls_in_over() != 0 && self.progress.crease.bowler == Some(bowler);
        let overs_started = self.progress.scorecard.player(bowler).overs_started();
        if !finishing_over && overs_started >= u32::from(limit) {
            return Err(Rejection::BowlerOverLimit { bowler, limit });
        }

        let new_over = tally.legal_balls > 0 && tally.balls_in_over() == 0;
        if new_over && self.progress.previous_over_bowler == Some(bowler) {
            return Err(Rejection::ConsecutiveOvers(bowler));
        }

        Ok(())
    }

    /// Admit a delivery and apply it locally until the store confirms it.
    pub fn plan_ball(&mut self, selection: &BallSelection) -> Result<PlannedBall, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let event = self.admit(selection)?;
        let checkpoint = self.progress.clone();
        if let Err(err) = self.progress.fold(&self.fixture, &event) {
            self.progress = checkpoint;
            return Err(err.into());
        }
        self.events.push(event.clone());

        let id = Uuid::new_v4();
        self.pending = Some(PendingBall { id, checkpoint });

        Ok(PlannedBall {
            id,
            event,
            phase: self.phase(),
        })
    }

    /// Keep a pending delivery, adopting the representation returned by the store.
    pub fn confirm(&mut self, plan_id: PlanId, stored: BallEvent) -> Result<(), ApplyError> {
        let pending = self.pending.take().ok_or(ApplyError::NoPending)?;

        if pending.id != plan_id {
            let expected = pending.id;
            self.pending = Some(pending);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        if let Some(last) = self.events.last_mut() {
            *last = stored;
        }
        Ok(())
    }

    /// Drop a pending delivery and restore the state that preceded it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let pending = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if pending.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: pending.id,
                got: plan_id,
            });
        }

        if let Some(pending) = self.pending.take() {
            self.progress = pending.checkpoint;
            self.events.pop();
        }
        Ok(())
    }

    /// The ball an undo would remove.
    pub fn undo_candidate(&self) -> Result<&BallEvent, Rejection> {
        if self.pending.is_some() {
            return Err(Rejection::SubmissionPending);
        }
        if self.phase() == MatchPhase::Completed {
            return Err(Rejection::MatchComplete);
        }
        self.events.last().ok_or(Rejection::NothingToUndo)
    }

    /// Engine state without the latest ball, rebuilt by replay.
    pub fn without_head(&self) -> Result<Self, ReplayError> {
        let mut events = self.events.clone();
        events.pop();
        Self::replay(self.fixture.clone(), events, self.second_innings_opened())
    }

    /// Prompt the scorer must resolve before the next delivery.
    pub fn required_prompt(&self) -> Prompt {
        match self.phase() {
            MatchPhase::AwaitingToss => Prompt::RecordToss,
            MatchPhase::InningsBreak => Prompt::InningsComplete,
            MatchPhase::Completed => Prompt::MatchComplete,
            MatchPhase::FirstInnings | MatchPhase::SecondInnings => {
                let Some(context) = self.innings() else {
                    return Prompt::RecordToss;
                };
                if self.tally(context.number).deliveries == 0 {
                    return Prompt::SelectOpeners;
                }

                let crease = self.progress.crease;
                if crease.striker.is_none() || crease.non_striker.is_none() {
                    Prompt::SelectNewBatsman
                } else if crease.bowler.is_none() {
                    Prompt::SelectBowler
                } else {
                    Prompt::None
                }
            }
        }
    }

    /// Batsmen who may walk in: not out and not already at the crease.
    pub fn batsman_candidates(&self) -> Vec<PlayerId> {
        let Some(context) = self.innings().filter(|_| self.phase().is_in_play()) else {
            return Vec::new();
        };
        let crease = self.progress.crease;
        self.fixture
            .side(context.batting)
            .roster
            .iter()
            .map(|player| player.id)
            .filter(|id| Some(*id) != crease.striker && Some(*id) != crease.non_striker)
            .filter(|id| !self.progress.scorecard.is_dismissed(*id))
            .collect()
    }

    /// Bowlers allowed to deliver the next ball.
    pub fn bowler_candidates(&self) -> Vec<PlayerId> {
        let Some(context) = self.innings().filter(|_| self.phase().is_in_play()) else {
            return Vec::new();
        };
        let tally = self.tally(context.number);
        self.fixture
            .side(context.bowling)
            .roster
            .iter()
            .map(|player| player.id)
            .filter(|id| self.check_bowler(*id, tally).is_ok())
            .collect()
    }

    /// Side-effect free projection of the whole match.
    pub fn view(&self) -> MatchView {
        let phase = self.phase();
        let mut innings = Vec::new();
        if let Some((batting, bowling)) = self.fixture.opening_sides() {
            innings.push(InningsSummary {
                number: InningsNumber::First,
                batting_team: batting,
                tally: self.tally(InningsNumber::First).clone(),
            });
            if matches!(
                phase,
                MatchPhase::InningsBreak | MatchPhase::SecondInnings | MatchPhase::Completed
            ) {
                innings.push(InningsSummary {
                    number: InningsNumber::Second,
                    batting_team: bowling,
                    tally: self.tally(InningsNumber::Second).clone(),
                });
            }
        }

        let current = self.innings();
        let run_rate = current
            .filter(|_| phase.is_in_play())
            .and_then(|context| self.tally(context.number).run_rate());
        let runs_needed = match (phase, self.target()) {
            (MatchPhase::InningsBreak | MatchPhase::SecondInnings, Some(target)) => {
                let scored = self.tally(InningsNumber::Second).total();
                Some((target + 1).saturating_sub(scored))
            }
            _ => None,
        };

        MatchView {
            match_id: self.fixture.id,
            phase,
            innings,
            current,
            target: self.target(),
            runs_needed,
            run_rate,
            crease: self.progress.crease,
            players: self
                .progress
                .scorecard
                .iter()
                .map(|(id, state)| (*id, state.clone()))
                .collect(),
            result: self.result().cloned(),
            prompt: self.required_prompt(),
            head: self.head(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        ball::{ExtraKind, WicketKind},
        fixture::{Team, TossDecision, tests::team},
        result::ResultOutcome,
    };

    struct Match {
        engine: ScoringEngine,
        home: Team,
        away: Team,
    }

    /// Home wins the toss and bats.
    fn setup(roster: usize, overs: u16) -> Match {
        let home = team("Home", roster);
        let away = team("Away", roster);
        let fixture =
            Fixture::new("Friendly".into(), home.clone(), away.clone(), overs, None).unwrap();
        let mut engine = ScoringEngine::new(fixture);
        engine
            .record_toss(Toss {
                winner: home.id,
                decision: TossDecision::Bat,
            })
            .unwrap();
        Match { engine, home, away }
    }

    /// Fill every empty slot from the engine's own candidate lists.
    fn auto_selection(engine: &ScoringEngine) -> BallSelection {
        let crease = engine.crease();
        let mut batsmen = engine.batsman_candidates().into_iter();
        let striker = crease.striker.or_else(|| batsmen.next());
        let non_striker = crease.non_striker.or_else(|| batsmen.next());
        let bowler = crease
            .bowler
            .or_else(|| engine.bowler_candidates().first().copied());
        BallSelection {
            striker,
            non_striker,
            bowler,
            delivery: None,
        }
    }

    fn commit(engine: &mut ScoringEngine, selection: &BallSelection) -> Result<BallEvent, PlanError> {
        let plan = engine.plan_ball(selection)?;
        engine.confirm(plan.id, plan.event.clone()).unwrap();
        Ok(plan.event)
    }

    fn bowl(engine: &mut ScoringEngine, delivery: Delivery) -> BallEvent {
        let mut selection = auto_selection(engine);
        selection.delivery = Some(delivery);
        commit(engine, &selection).unwrap()
    }

    fn runs(engine: &mut ScoringEngine, runs: u8) -> BallEvent {
        bowl(engine, Delivery::Runs { runs })
    }

    fn wide(engine: &mut ScoringEngine) -> BallEvent {
        bowl(
            engine,
            Delivery::Extra {
                kind: ExtraKind::Wide,
                extras: 1,
                runs: 0,
            },
        )
    }

    fn striker_out(engine: &mut ScoringEngine) -> BallEvent {
        let mut selection = auto_selection(engine);
        let dismissed = selection.striker.unwrap();
        selection.delivery = Some(Delivery::Wicket {
            kind: WicketKind::Bowled,
            dismissed,
            fielder: None,
            runs: 0,
        });
        commit(engine, &selection).unwrap()
    }

    #[test]
    fn legal_deliveries_number_balls_and_extras_do_not_advance() {
        let Match { mut engine, .. } = setup(11, 5);
        let mut numbering = Vec::new();
        for index in 0..13 {
            if index % 4 == 1 {
                let event = wide(&mut engine);
                numbering.push((event.over, event.ball, false));
            }
            let event = runs(&mut engine, 0);
            numbering.push((event.over, event.ball, true));
        }

        let legal: Vec<_> = numbering
            .iter()
            .filter(|(_, _, legal)| *legal)
            .map(|(over, ball, _)| (*over, *ball))
            .collect();
        let expected: Vec<_> = (0..13u16).map(|n| (n / 6, (n % 6) as u8 + 1)).collect();
        assert_eq!(legal, expected);

        // Each wide repeats the position of the last legal ball.
        for window in numbering.windows(2) {
            if !window[1].2 {
                let (over, ball, _) = window[0];
                let expected = if ball == 6 { (over + 1, 0) } else { (over, ball) };
                assert_eq!((window[1].0, window[1].1), expected);
            }
        }
        assert_eq!(engine.tally(InningsNumber::First).overs(), "2.1");
    }

    #[test]
    fn innings_continues_until_all_out() {
        let roster = 5;
        let Match { mut engine, .. } = setup(roster, 20);
        for _ in 0..roster - 2 {
            striker_out(&mut engine);
        }
        assert_eq!(engine.tally(InningsNumber::First).wickets, 3);
        assert_eq!(engine.phase(), MatchPhase::FirstInnings);

        striker_out(&mut engine);
        assert_eq!(engine.phase(), MatchPhase::InningsBreak);
        assert_eq!(engine.required_prompt(), Prompt::InningsComplete);
    }

    #[test]
    fn innings_closes_exactly_when_overs_complete() {
        let Match {
            mut engine,
            home,
            away,
        } = setup(11, 2);
        for _ in 0..11 {
            runs(&mut engine, 2);
        }
        wide(&mut engine);
        assert_eq!(engine.tally(InningsNumber::First).legal_balls, 11);
        assert_eq!(engine.phase(), MatchPhase::FirstInnings);

        runs(&mut engine, 0);
        assert_eq!(engine.phase(), MatchPhase::InningsBreak);
        assert_eq!(engine.target(), Some(23));
        let context = engine.innings().unwrap();
        assert_eq!(context.batting, away.id);
        assert_eq!(context.bowling, home.id);
        assert_eq!(engine.crease(), Crease::default());
    }

    #[test]
    fn odd_runs_rotate_strike_and_over_end_rotates_again() {
        let Match { mut engine, .. } = setup(11, 5);
        let first = runs(&mut engine, 0);
        let (a, b) = (first.striker, first.non_striker);
        assert_eq!(engine.crease().striker, Some(a));

        runs(&mut engine, 1);
        assert_eq!(engine.crease().striker, Some(b));
        runs(&mut engine, 2);
        assert_eq!(engine.crease().striker, Some(b));
        runs(&mut engine, 3);
        assert_eq!(engine.crease().striker, Some(a));
        runs(&mut engine, 4);
        assert_eq!(engine.crease().striker, Some(a));
        runs(&mut engine, 6);
        // Sixth legal ball: ends change.
        assert_eq!(engine.crease().striker, Some(b));
        assert_eq!(engine.crease().non_striker, Some(a));
        assert_eq!(engine.crease().bowler, None);
        assert_eq!(engine.required_prompt(), Prompt::SelectBowler);
    }

    #[test]
    fn single_off_last_ball_keeps_striker_for_next_over() {
        let Match { mut engine, .. } = setup(11, 5);
        let first = runs(&mut engine, 0);
        for _ in 0..4 {
            runs(&mut engine, 0);
        }
        runs(&mut engine, 1);
        assert_eq!(engine.crease().striker, Some(first.striker));
    }

    #[test]
    fn odd_runs_off_a_wide_do_not_rotate() {
        let Match { mut engine, .. } = setup(11, 5);
        let first = runs(&mut engine, 0);
        bowl(
            &mut engine,
            Delivery::Extra {
                kind: ExtraKind::NoBall,
                extras: 1,
                runs: 1,
            },
        );
        assert_eq!(engine.crease().striker, Some(first.striker));
        assert_eq!(engine.tally(InningsNumber::First).total(), 2);
    }

    /// Innings 1 scores 120 in 20 overs, innings 2 reaches 121 in 18.3 overs four down.
    #[test]
    fn chase_result_uses_wickets_in_hand() {
        let Match {
            mut engine, away, ..
        } = setup(11, 20);
        for _ in 0..20 {
            runs(&mut engine, 6);
        }
        while engine.phase() == MatchPhase::FirstInnings {
            runs(&mut engine, 0);
        }
        assert_eq!(engine.target(), Some(120));
        engine.start_second_innings().unwrap();

        for _ in 0..4 {
            striker_out(&mut engine);
        }
        for _ in 0..20 {
            runs(&mut engine, 6);
        }
        while engine.tally(InningsNumber::Second).legal_balls < 110 {
            runs(&mut engine, 0);
        }
        assert_eq!(engine.phase(), MatchPhase::SecondInnings);
        assert_eq!(engine.view().runs_needed, Some(1));

        runs(&mut engine, 1);
        let tally = engine.tally(InningsNumber::Second);
        assert_eq!(tally.total(), 121);
        assert_eq!(tally.overs(), "18.3");
        assert_eq!(engine.phase(), MatchPhase::Completed);

        let result = engine.result().unwrap();
        assert_eq!(result.outcome, ResultOutcome::ChasingSideWon { wickets: 6 });
        assert_eq!(result.winner, Some(away.id));
        assert_eq!(result.text, "Away won by 6 wickets");
        assert_eq!(engine.required_prompt(), Prompt::MatchComplete);
    }

    #[test]
    fn level_scores_after_overs_tie() {
        let Match { mut engine, .. } = setup(11, 1);
        for _ in 0..6 {
            runs(&mut engine, 1);
        }
        assert_eq!(engine.phase(), MatchPhase::InningsBreak);
        engine.start_second_innings().unwrap();
        for _ in 0..6 {
            runs(&mut engine, 1);
        }
        let result = engine.result().unwrap();
        assert_eq!(result.outcome, ResultOutcome::Tie);
        assert_eq!(result.text, "Match tied");
        assert_eq!(result.winner, None);
    }

    #[test]
    fn falling_short_when_all_out_loses_by_runs() {
        let Match {
            mut engine, home, ..
        } = setup(3, 3);
        for _ in 0..6 {
            runs(&mut engine, 4);
        }
        for _ in 0..2 {
            striker_out(&mut engine);
        }
        assert_eq!(engine.target(), Some(24));
        engine.start_second_innings().unwrap();

        runs(&mut engine, 4);
        striker_out(&mut engine);
        striker_out(&mut engine);
        let result = engine.result().unwrap();
        assert_eq!(result.outcome, ResultOutcome::DefendingSideWon { runs: 20 });
        assert_eq!(result.winner, Some(home.id));
    }

    #[test]
    fn bowler_is_stopped_at_over_limit() {
        let Match {
            mut engine, away, ..
        } = setup(11, 10);
        assert_eq!(engine.fixture().bowler_over_limit, 2);
        let (x, y) = (away.roster[0].id, away.roster[1].id);

        let first = runs(&mut engine, 0);
        // `first` was bowled by the first candidate, which is `x`.
        assert_eq!(first.bowler, x);
        let dot_ball = |engine: &ScoringEngine, bowler: PlayerId| {
            let crease = engine.crease();
            BallSelection {
                striker: crease.striker,
                non_striker: crease.non_striker,
                bowler: Some(bowler),
                delivery: Some(Delivery::Runs { runs: 0 }),
            }
        };
        for over in 0..4 {
            let bowler = if over % 2 == 0 { x } else { y };
            let balls = if over == 0 { 5 } else { 6 };
            for _ in 0..balls {
                let selection = dot_ball(&engine, bowler);
                commit(&mut engine, &selection).unwrap();
            }
        }
        assert_eq!(engine.scorecard().player(x).balls_bowled, 12);

        let selection = dot_ball(&engine, x);
        let err = commit(&mut engine, &selection).unwrap_err();
        assert_eq!(
            err,
            PlanError::Rejected(Rejection::BowlerOverLimit { bowler: x, limit: 2 })
        );
        assert!(!engine.bowler_candidates().contains(&x));
        assert!(!engine.bowler_candidates().contains(&y));
    }

    #[test]
    fn bowler_may_finish_an_over_that_crosses_the_limit() {
        let Match { mut engine, .. } = setup(11, 5);
        assert_eq!(engine.fixture().bowler_over_limit, 1);
        let first = runs(&mut engine, 0);
        // One over started: rounded up, the allocation is used, yet the over can go on.
        assert_eq!(engine.scorecard().player(first.bowler).overs_started(), 1);
        for _ in 0..5 {
            let event = runs(&mut engine, 0);
            assert_eq!(event.bowler, first.bowler);
        }
        assert!(!engine.bowler_candidates().contains(&first.bowler));
    }

    #[test]
    fn same_bowler_cannot_bowl_consecutive_overs() {
        let Match { mut engine, .. } = setup(11, 20);
        let first = runs(&mut engine, 0);
        for _ in 0..5 {
            runs(&mut engine, 0);
        }
        let crease = engine.crease();
        let selection = BallSelection {
            striker: crease.striker,
            non_striker: crease.non_striker,
            bowler: Some(first.bowler),
            delivery: Some(Delivery::Runs { runs: 0 }),
        };
        assert_eq!(
            engine.admit(&selection).unwrap_err(),
            Rejection::ConsecutiveOvers(first.bowler)
        );
    }

    #[test]
    fn incomplete_selection_is_rejected() {
        let Match {
            engine, home, away, ..
        } = setup(11, 5);
        let complete = BallSelection {
            striker: Some(home.roster[0].id),
            non_striker: Some(home.roster[1].id),
            bowler: Some(away.roster[0].id),
            delivery: Some(Delivery::Runs { runs: 1 }),
        };
        assert!(engine.admit(&complete).is_ok());

        let cases = [
            (
                BallSelection {
                    striker: None,
                    ..complete.clone()
                },
                Rejection::MissingStriker,
            ),
            (
                BallSelection {
                    non_striker: None,
                    ..complete.clone()
                },
                Rejection::MissingNonStriker,
            ),
            (
                BallSelection {
                    bowler: None,
                    ..complete.clone()
                },
                Rejection::MissingBowler,
            ),
            (
                BallSelection {
                    delivery: None,
                    ..complete.clone()
                },
                Rejection::MissingOutcome,
            ),
            (
                BallSelection {
                    non_striker: complete.striker,
                    ..complete.clone()
                },
                Rejection::SameBatsmen,
            ),
            (
                BallSelection {
                    bowler: Some(home.roster[5].id),
                    ..complete.clone()
                },
                Rejection::NotInBowlingSide(home.roster[5].id),
            ),
            (
                BallSelection {
                    striker: Some(away.roster[3].id),
                    ..complete.clone()
                },
                Rejection::NotInBattingSide(away.roster[3].id),
            ),
            (
                BallSelection {
                    delivery: Some(Delivery::Runs { runs: 7 }),
                    ..complete.clone()
                },
                Rejection::InvalidRuns(7),
            ),
            (
                BallSelection {
                    delivery: Some(Delivery::Extra {
                        kind: ExtraKind::Wide,
                        extras: 0,
                        runs: 0,
                    }),
                    ..complete.clone()
                },
                Rejection::InvalidExtras,
            ),
            (
                BallSelection {
                    delivery: Some(Delivery::Wicket {
                        kind: WicketKind::Caught,
                        dismissed: home.roster[4].id,
                        fielder: None,
                        runs: 0,
                    }),
                    ..complete.clone()
                },
                Rejection::DismissedNotAtCrease(home.roster[4].id),
            ),
        ];

        for (selection, expected) in cases {
            assert_eq!(engine.admit(&selection).unwrap_err(), expected);
        }
    }

    #[test]
    fn batsmen_must_keep_their_ends() {
        let Match { mut engine, .. } = setup(11, 5);
        let single = runs(&mut engine, 1);
        let crease = engine.crease();
        assert_eq!(crease.striker, Some(single.non_striker));

        let unswapped = BallSelection {
            striker: Some(single.striker),
            non_striker: Some(single.non_striker),
            bowler: Some(single.bowler),
            delivery: Some(Delivery::Runs { runs: 0 }),
        };
        assert_eq!(
            engine.admit(&unswapped).unwrap_err(),
            Rejection::WrongEnd {
                selected: single.striker,
                expected: single.non_striker,
            }
        );

        let swapped = BallSelection {
            striker: Some(single.non_striker),
            non_striker: Some(single.striker),
            ..unswapped
        };
        assert!(engine.admit(&swapped).is_ok());
    }

    #[test]
    fn fresh_batsmen_cannot_replace_a_not_out_pair() {
        let Match { mut engine, .. } = setup(11, 5);
        let dot = runs(&mut engine, 0);
        let fresh = engine.batsman_candidates();
        let selection = BallSelection {
            striker: Some(fresh[0]),
            non_striker: Some(fresh[1]),
            bowler: Some(dot.bowler),
            delivery: Some(Delivery::Runs { runs: 0 }),
        };
        assert_eq!(
            engine.admit(&selection).unwrap_err(),
            Rejection::WrongEnd {
                selected: fresh[0],
                expected: dot.striker,
            }
        );
    }

    #[test]
    fn new_batsman_fills_the_vacant_end_beside_the_partner() {
        let Match { mut engine, .. } = setup(11, 5);
        let out = striker_out(&mut engine);
        let incoming = engine.batsman_candidates()[0];
        let selection = BallSelection {
            striker: Some(incoming),
            non_striker: Some(out.non_striker),
            bowler: Some(out.bowler),
            delivery: Some(Delivery::Runs { runs: 0 }),
        };
        assert!(engine.admit(&selection).is_ok());

        let partner_dropped = BallSelection {
            non_striker: engine.batsman_candidates().get(1).copied(),
            ..selection
        };
        assert_eq!(
            engine.admit(&partner_dropped).unwrap_err(),
            Rejection::WrongEnd {
                selected: engine.batsman_candidates()[1],
                expected: out.non_striker,
            }
        );
    }

    #[test]
    fn dismissed_batsman_cannot_return() {
        let Match { mut engine, .. } = setup(11, 5);
        let out = striker_out(&mut engine);
        assert_eq!(engine.required_prompt(), Prompt::SelectNewBatsman);
        assert!(!engine.batsman_candidates().contains(&out.striker));
        assert!(!engine.batsman_candidates().contains(&out.non_striker));

        let selection = BallSelection {
            striker: Some(out.striker),
            non_striker: Some(out.non_striker),
            bowler: Some(out.bowler),
            delivery: Some(Delivery::Runs { runs: 0 }),
        };
        assert_eq!(
            engine.admit(&selection).unwrap_err(),
            Rejection::AlreadyDismissed(out.striker)
        );
    }

    #[test]
    fn run_out_at_non_strikers_end_vacates_that_end() {
        let Match { mut engine, .. } = setup(11, 5);
        let first = runs(&mut engine, 0);
        let mut selection = auto_selection(&engine);
        selection.delivery = Some(Delivery::Wicket {
            kind: WicketKind::RunOut,
            dismissed: first.non_striker,
            fielder: None,
            runs: 1,
        });
        commit(&mut engine, &selection).unwrap();

        // The single swapped ends before the run out, so the vacancy is on strike.
        let crease = engine.crease();
        assert_eq!(crease.striker, None);
        assert_eq!(crease.non_striker, Some(first.striker));
        assert_eq!(engine.scorecard().player(first.bowler).wickets, 0);
        assert_eq!(engine.required_prompt(), Prompt::SelectNewBatsman);
    }

    #[test]
    fn no_ball_before_the_toss_or_during_the_break() {
        let home = team("Home", 11);
        let away = team("Away", 11);
        let fixture = Fixture::new("Friendly".into(), home.clone(), away.clone(), 1, None).unwrap();
        let engine = ScoringEngine::new(fixture);
        assert_eq!(engine.required_prompt(), Prompt::RecordToss);
        assert_eq!(
            engine.admit(&BallSelection::default()).unwrap_err(),
            Rejection::TossPending
        );

        let Match { mut engine, .. } = setup(11, 1);
        for _ in 0..6 {
            runs(&mut engine, 0);
        }
        let selection = BallSelection {
            delivery: Some(Delivery::Runs { runs: 0 }),
            ..BallSelection::default()
        };
        assert_eq!(
            engine.admit(&selection).unwrap_err(),
            Rejection::InningsComplete
        );
        assert_eq!(engine.view().runs_needed, Some(1));

        engine.start_second_innings().unwrap();
        assert_eq!(engine.required_prompt(), Prompt::SelectOpeners);
        runs(&mut engine, 1);
        assert_eq!(engine.phase(), MatchPhase::Completed);
        assert_eq!(
            engine.admit(&auto_selection(&engine)).unwrap_err(),
            Rejection::MatchComplete
        );
    }

    #[test]
    fn toss_cannot_be_recorded_twice_or_for_a_stranger() {
        let Match {
            mut engine, home, ..
        } = setup(11, 5);
        let err = engine
            .record_toss(Toss {
                winner: home.id,
                decision: TossDecision::Bowl,
            })
            .unwrap_err();
        assert!(matches!(err, TossError::Transition(_)));

        let fixture =
            Fixture::new("Friendly".into(), team("A", 2), team("B", 2), 2, None).unwrap();
        let mut engine = ScoringEngine::new(fixture);
        let stranger = Uuid::new_v4();
        assert_eq!(
            engine
                .record_toss(Toss {
                    winner: stranger,
                    decision: TossDecision::Bat,
                })
                .unwrap_err(),
            TossError::Fixture(FixtureError::UnknownTeam(stranger))
        );
        assert_eq!(engine.phase(), MatchPhase::AwaitingToss);
    }

    #[test]
    fn abort_restores_previous_state() {
        let Match { mut engine, .. } = setup(11, 1);
        for _ in 0..5 {
            runs(&mut engine, 1);
        }
        let before_progress = engine.progress.clone();
        let before_events = engine.events().len();

        let mut selection = auto_selection(&engine);
        selection.delivery = Some(Delivery::Runs { runs: 4 });
        let plan = engine.plan_ball(&selection).unwrap();
        assert_eq!(plan.phase, MatchPhase::InningsBreak);
        assert_eq!(
            engine.plan_ball(&selection).unwrap_err(),
            PlanError::AlreadyPending
        );

        let other = Uuid::new_v4();
        assert_eq!(
            engine.abort(other).unwrap_err(),
            AbortError::IdMismatch {
                expected: plan.id,
                got: other
            }
        );
        engine.abort(plan.id).unwrap();
        assert_eq!(engine.progress, before_progress);
        assert_eq!(engine.events().len(), before_events);
        assert_eq!(engine.phase(), MatchPhase::FirstInnings);
        assert_eq!(engine.abort(plan.id).unwrap_err(), AbortError::NoPending);
    }

    #[test]
    fn confirm_adopts_store_representation() {
        let Match { mut engine, .. } = setup(11, 5);
        let mut selection = auto_selection(&engine);
        selection.delivery = Some(Delivery::Runs { runs: 2 });
        let plan = engine.plan_ball(&selection).unwrap();

        let mut stored = plan.event.clone();
        stored.id = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert_eq!(
            engine.confirm(other, stored.clone()).unwrap_err(),
            ApplyError::IdMismatch {
                expected: plan.id,
                got: other,
            }
        );
        engine.confirm(plan.id, stored.clone()).unwrap();
        assert_eq!(engine.events().last(), Some(&stored));
        assert_eq!(
            engine.confirm(plan.id, stored).unwrap_err(),
            ApplyError::NoPending
        );
    }

    #[test]
    fn undo_on_empty_match_is_refused() {
        let Match { engine, .. } = setup(11, 5);
        assert_eq!(
            engine.undo_candidate().unwrap_err(),
            Rejection::NothingToUndo
        );
        let rebuilt = engine.without_head().unwrap();
        assert!(rebuilt.events().is_empty());
    }

    #[test]
    fn undo_of_innings_closing_ball_reopens_the_innings() {
        let Match { mut engine, .. } = setup(11, 1);
        for _ in 0..6 {
            runs(&mut engine, 2);
        }
        assert_eq!(engine.phase(), MatchPhase::InningsBreak);
        let head = engine.undo_candidate().unwrap().clone();
        assert_eq!(head.sequence, 6);

        let engine = engine.without_head().unwrap();
        assert_eq!(engine.phase(), MatchPhase::FirstInnings);
        assert_eq!(engine.tally(InningsNumber::First).total(), 10);
        assert_eq!(engine.head(), 5);
        assert_eq!(engine.target(), None);
    }

    #[test]
    fn completed_match_cannot_be_undone() {
        let Match { mut engine, .. } = setup(11, 1);
        for _ in 0..6 {
            runs(&mut engine, 0);
        }
        engine.start_second_innings().unwrap();
        runs(&mut engine, 1);
        assert_eq!(
            engine.undo_candidate().unwrap_err(),
            Rejection::MatchComplete
        );
    }

    #[test]
    fn replay_matches_live_scoring() {
        let Match { mut engine, .. } = setup(4, 2);
        runs(&mut engine, 1);
        wide(&mut engine);
        striker_out(&mut engine);
        for _ in 0..10 {
            runs(&mut engine, 3);
        }
        assert_eq!(engine.phase(), MatchPhase::InningsBreak);
        engine.start_second_innings().unwrap();
        runs(&mut engine, 4);
        striker_out(&mut engine);

        let mut shuffled = engine.events().to_vec();
        shuffled.reverse();
        let replayed = ScoringEngine::replay(engine.fixture().clone(), shuffled, false).unwrap();
        assert_eq!(replayed.progress, engine.progress);
        assert_eq!(replayed.view(), engine.view());
    }

    #[test]
    fn replay_keeps_break_acknowledgement() {
        let Match { mut engine, .. } = setup(11, 1);
        for _ in 0..6 {
            runs(&mut engine, 0);
        }
        engine.start_second_innings().unwrap();
        let events = engine.events().to_vec();

        let closed = ScoringEngine::replay(engine.fixture().clone(), events.clone(), false).unwrap();
        assert_eq!(closed.phase(), MatchPhase::InningsBreak);
        let opened = ScoringEngine::replay(engine.fixture().clone(), events, true).unwrap();
        assert_eq!(opened.phase(), MatchPhase::SecondInnings);
    }

    #[test]
    fn replay_rejects_balls_without_toss() {
        let Match { mut engine, .. } = setup(11, 5);
        let event = runs(&mut engine, 1);
        let mut fixture = engine.fixture().clone();
        fixture.toss = None;
        assert_eq!(
            ScoringEngine::replay(fixture, vec![event.clone()], false).unwrap_err(),
            ReplayError::BeforeToss(event.id)
        );
    }

    #[test]
    fn prompts_follow_the_innings() {
        let Match { mut engine, .. } = setup(11, 5);
        assert_eq!(engine.required_prompt(), Prompt::SelectOpeners);
        runs(&mut engine, 0);
        assert_eq!(engine.required_prompt(), Prompt::None);
        for _ in 0..5 {
            runs(&mut engine, 0);
        }
        assert_eq!(engine.required_prompt(), Prompt::SelectBowler);
        striker_out(&mut engine);
        assert_eq!(engine.required_prompt(), Prompt::SelectNewBatsman);
    }

    #[test]
    fn view_reports_totals_and_run_rate() {
        let Match { mut engine, .. } = setup(11, 5);
        for _ in 0..3 {
            runs(&mut engine, 4);
        }
        wide(&mut engine);
        let view = engine.view();
        assert_eq!(view.innings.len(), 1);
        assert_eq!(view.innings[0].tally.total(), 13);
        assert_eq!(view.innings[0].tally.overs(), "0.3");
        assert_eq!(view.run_rate, Some(26.0));
        assert_eq!(view.target, None);
        assert_eq!(view.head, 4);
    }
}
