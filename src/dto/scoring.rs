use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::{
        format_system_time,
        matches::{PlayerSummary, ResultSummary},
        phase::{PromptDto, VisibleMatchPhase},
    },
    state::{
        ball::{BallEvent, BallSelection, Delivery, ExtraKind, WicketKind},
        fixture::{Fixture, PlayerId},
        scoring::{MatchView, Prompt, Rejection},
        stats::overs_notation,
    },
};

fn default_extras() -> u8 {
    1
}

/// Selection and outcome of the next delivery.
///
/// Every field is optional so that an incomplete form is reported as a rejection
/// reason instead of a decoding error.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SubmitBallRequest {
    #[serde(default)]
    pub striker_id: Option<Uuid>,
    #[serde(default)]
    pub non_striker_id: Option<Uuid>,
    #[serde(default)]
    pub bowler_id: Option<Uuid>,
    #[serde(default)]
    pub outcome: Option<OutcomeInput>,
}

/// What happened on the delivery.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OutcomeInput {
    /// Runs off the bat (or run before a run out).
    #[serde(default)]
    pub runs: u8,
    #[serde(default)]
    pub extra: Option<ExtraInput>,
    #[serde(default)]
    pub wicket: Option<WicketInput>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExtraInput {
    pub kind: ExtraKindDto,
    /// Penalty runs conceded, one when omitted.
    #[serde(default = "default_extras")]
    pub extras: u8,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WicketInput {
    pub kind: WicketKindDto,
    /// Batsman given out: the striker, or the non-striker on a run out.
    pub dismissed_id: Uuid,
    #[serde(default)]
    pub fielder_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtraKindDto {
    Wide,
    NoBall,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WicketKindDto {
    Bowled,
    Caught,
    Lbw,
    RunOut,
    Stumped,
    HitWicket,
}

impl From<ExtraKindDto> for ExtraKind {
    fn from(value: ExtraKindDto) -> Self {
        match value {
            ExtraKindDto::Wide => ExtraKind::Wide,
            ExtraKindDto::NoBall => ExtraKind::NoBall,
        }
    }
}

impl From<ExtraKind> for ExtraKindDto {
    fn from(value: ExtraKind) -> Self {
        match value {
            ExtraKind::Wide => ExtraKindDto::Wide,
            ExtraKind::NoBall => ExtraKindDto::NoBall,
        }
    }
}

impl From<WicketKindDto> for WicketKind {
    fn from(value: WicketKindDto) -> Self {
        match value {
            WicketKindDto::Bowled => WicketKind::Bowled,
            WicketKindDto::Caught => WicketKind::Caught,
            WicketKindDto::Lbw => WicketKind::Lbw,
            WicketKindDto::RunOut => WicketKind::RunOut,
            WicketKindDto::Stumped => WicketKind::Stumped,
            WicketKindDto::HitWicket => WicketKind::HitWicket,
        }
    }
}

impl From<WicketKind> for WicketKindDto {
    fn from(value: WicketKind) -> Self {
        match value {
            WicketKind::Bowled => WicketKindDto::Bowled,
            WicketKind::Caught => WicketKindDto::Caught,
            WicketKind::Lbw => WicketKindDto::Lbw,
            WicketKind::RunOut => WicketKindDto::RunOut,
            WicketKind::Stumped => WicketKindDto::Stumped,
            WicketKind::HitWicket => WicketKindDto::HitWicket,
        }
    }
}

impl TryFrom<OutcomeInput> for Delivery {
    type Error = Rejection;

    fn try_from(value: OutcomeInput) -> Result<Self, Self::Error> {
        match (value.extra, value.wicket) {
            (Some(_), Some(_)) => Err(Rejection::AmbiguousOutcome),
            (Some(extra), None) => Ok(Delivery::Extra {
                kind: extra.kind.into(),
                extras: extra.extras,
                runs: value.runs,
            }),
            (None, Some(wicket)) => Ok(Delivery::Wicket {
                kind: wicket.kind.into(),
                dismissed: wicket.dismissed_id,
                fielder: wicket.fielder_id,
                runs: value.runs,
            }),
            (None, None) => Ok(Delivery::Runs { runs: value.runs }),
        }
    }
}

impl TryFrom<SubmitBallRequest> for BallSelection {
    type Error = Rejection;

    fn try_from(value: SubmitBallRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            striker: value.striker_id,
            non_striker: value.non_striker_id,
            bowler: value.bowler_id,
            delivery: value.outcome.map(Delivery::try_from).transpose()?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct WicketSummary {
    pub kind: WicketKindDto,
    pub dismissed_id: Uuid,
    pub fielder_id: Option<Uuid>,
}

/// Accepted delivery as exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct BallSummary {
    pub id: Uuid,
    pub sequence: u64,
    pub innings: u8,
    pub over: u16,
    pub ball: u8,
    /// `over.ball` label, e.g. `4.2`.
    pub label: String,
    pub striker_id: Uuid,
    pub non_striker_id: Uuid,
    pub bowler_id: Uuid,
    pub runs: u8,
    pub extras: u8,
    pub extra_kind: Option<ExtraKindDto>,
    pub wicket: Option<WicketSummary>,
    pub recorded_at: String,
}

impl From<&BallEvent> for BallSummary {
    fn from(event: &BallEvent) -> Self {
        let delivery = &event.delivery;
        let (extra_kind, wicket) = match *delivery {
            Delivery::Runs { .. } => (None, None),
            Delivery::Extra { kind, .. } => (Some(kind.into()), None),
            Delivery::Wicket {
                kind,
                dismissed,
                fielder,
                ..
            } => (
                None,
                Some(WicketSummary {
                    kind: kind.into(),
                    dismissed_id: dismissed,
                    fielder_id: fielder,
                }),
            ),
        };

        Self {
            id: event.id,
            sequence: event.sequence,
            innings: event.innings.as_u8(),
            over: event.over,
            ball: event.ball,
            label: format!("{}.{}", event.over, event.ball),
            striker_id: event.striker,
            non_striker_id: event.non_striker,
            bowler_id: event.bowler,
            runs: delivery.runs(),
            extras: delivery.extras(),
            extra_kind,
            wicket,
            recorded_at: format_system_time(event.recorded_at),
        }
    }
}

/// Result of a ball submission. Rule violations are not errors: they come back
/// with `accepted = false` and a reason.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitOutcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ball: Option<BallSummary>,
    /// Prompt to resolve before the next delivery.
    pub prompt: PromptDto,
    /// Set when the ball was recorded but the match result could not be stored yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SubmitOutcome {
    /// Delivery recorded.
    pub fn accepted(ball: &BallEvent, prompt: Prompt) -> Self {
        Self {
            accepted: true,
            reason: None,
            ball: Some(ball.into()),
            prompt: prompt.into(),
            warning: None,
        }
    }

    /// Attach a warning to an accepted delivery.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    /// Delivery refused by the scoring rules.
    pub fn rejected(rejection: &Rejection, prompt: Prompt) -> Self {
        Self {
            accepted: false,
            reason: Some(rejection.to_string()),
            ball: None,
            prompt: prompt.into(),
            warning: None,
        }
    }
}

/// Result of an undo request.
#[derive(Debug, Serialize, ToSchema)]
pub struct UndoOutcome {
    pub undone: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Ball that was removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ball: Option<BallSummary>,
    pub prompt: PromptDto,
}

impl UndoOutcome {
    /// Head ball removed.
    pub fn undone(ball: &BallEvent, prompt: Prompt) -> Self {
        Self {
            undone: true,
            reason: None,
            ball: Some(ball.into()),
            prompt: prompt.into(),
        }
    }

    /// Nothing removed.
    pub fn refused(rejection: &Rejection, prompt: Prompt) -> Self {
        Self {
            undone: false,
            reason: Some(rejection.to_string()),
            ball: None,
            prompt: prompt.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct InningsScore {
    pub number: u8,
    pub batting_team_id: Uuid,
    pub batting_team: String,
    pub runs: u32,
    pub extras: u32,
    pub total: u32,
    pub wickets: u16,
    /// `overs.balls` notation.
    pub overs: String,
    pub run_rate: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema, Clone, Default)]
pub struct CreaseSummary {
    pub striker_id: Option<Uuid>,
    pub non_striker_id: Option<Uuid>,
    pub bowler_id: Option<Uuid>,
}

/// Match figures of one player.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PlayerFigures {
    pub player_id: Uuid,
    pub name: String,
    pub team_id: Option<Uuid>,
    pub runs_scored: u32,
    pub balls_faced: u32,
    pub dismissed: bool,
    /// Overs bowled in `overs.balls` notation.
    pub overs_bowled: String,
    pub runs_conceded: u32,
    pub wickets: u16,
}

/// Full derived projection of a match: score, rates, target, crease and figures.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct MatchViewResponse {
    pub match_id: Uuid,
    pub phase: VisibleMatchPhase,
    pub innings: Vec<InningsScore>,
    pub batting_team_id: Option<Uuid>,
    pub bowling_team_id: Option<Uuid>,
    /// Opening innings total, once fixed.
    pub target: Option<u32>,
    /// Runs the chasing side still needs to win.
    pub runs_needed: Option<u32>,
    /// Run rate of the innings in play.
    pub run_rate: Option<f64>,
    pub crease: CreaseSummary,
    pub players: Vec<PlayerFigures>,
    pub result: Option<ResultSummary>,
    pub prompt: PromptDto,
    /// Sequence number of the latest ball.
    pub head: u64,
}

impl MatchViewResponse {
    /// Attach fixture names to a derived view.
    pub fn new(view: &MatchView, fixture: &Fixture) -> Self {
        let name_of = |id: PlayerId| fixture.player_name(id).unwrap_or_default().to_string();

        Self {
            match_id: view.match_id,
            phase: view.phase.into(),
            innings: view
                .innings
                .iter()
                .map(|innings| InningsScore {
                    number: innings.number.as_u8(),
                    batting_team_id: innings.batting_team,
                    batting_team: fixture.side(innings.batting_team).name.clone(),
                    runs: innings.tally.runs,
                    extras: innings.tally.extras,
                    total: innings.tally.total(),
                    wickets: innings.tally.wickets,
                    overs: innings.tally.overs(),
                    run_rate: innings.tally.run_rate(),
                })
                .collect(),
            batting_team_id: view.current.map(|context| context.batting),
            bowling_team_id: view.current.map(|context| context.bowling),
            target: view.target,
            runs_needed: view.runs_needed,
            run_rate: view.run_rate,
            crease: CreaseSummary {
                striker_id: view.crease.striker,
                non_striker_id: view.crease.non_striker,
                bowler_id: view.crease.bowler,
            },
            players: view
                .players
                .iter()
                .map(|(id, state)| PlayerFigures {
                    player_id: *id,
                    name: name_of(*id),
                    team_id: fixture.team_of(*id),
                    runs_scored: state.runs_scored,
                    balls_faced: state.balls_faced,
                    dismissed: state.dismissed,
                    overs_bowled: overs_notation(state.balls_bowled),
                    runs_conceded: state.runs_conceded,
                    wickets: state.wickets,
                })
                .collect(),
            result: view.result.as_ref().map(ResultSummary::from),
            prompt: view.prompt.into(),
            head: view.head,
        }
    }
}

/// Prompt with the players the scorer may pick to resolve it.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PromptResponse {
    pub prompt: PromptDto,
    pub batsman_candidates: Vec<PlayerSummary>,
    pub bowler_candidates: Vec<PlayerSummary>,
}

impl PromptResponse {
    /// Resolve candidate identifiers to names.
    pub fn new(
        prompt: Prompt,
        batsmen: &[PlayerId],
        bowlers: &[PlayerId],
        fixture: &Fixture,
    ) -> Self {
        let summarise = |ids: &[PlayerId]| -> Vec<PlayerSummary> {
            ids.iter()
                .map(|id| PlayerSummary {
                    id: *id,
                    name: fixture.player_name(*id).unwrap_or_default().to_string(),
                })
                .collect()
        };
        Self {
            prompt: prompt.into(),
            batsman_candidates: summarise(batsmen),
            bowler_candidates: summarise(bowlers),
        }
    }
}
