use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::MatchListItemEntity,
    dto::{
        format_system_time,
        phase::{MatchStatusDto, VisibleMatchPhase},
        validation::validate_name,
    },
    state::{
        fixture::{CoinFace, MatchStatus, Player, Team, Toss, TossDecision},
        result::{MatchResult, ResultOutcome},
        scoring::ScoringEngine,
    },
};

/// Payload used to set up a new match.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateMatchRequest {
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[validate(nested)]
    pub team_a: TeamInput,
    #[validate(nested)]
    pub team_b: TeamInput,
    #[validate(range(min = 1, max = 50))]
    pub overs_per_innings: u16,
}

/// Incoming side definition.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TeamInput {
    /// Keeps an identifier known to the client. Generated when omitted.
    #[serde(default)]
    pub id: Option<Uuid>,
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    /// Players in batting-order preference.
    #[validate(length(min = 2, max = 15), nested)]
    pub players: Vec<PlayerInput>,
}

/// Incoming player definition.
///
/// `Serialize` lets the roster length rule echo the rejected value back.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct PlayerInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[validate(custom(function = "validate_name"))]
    pub name: String,
}

impl From<PlayerInput> for Player {
    fn from(value: PlayerInput) -> Self {
        Self {
            id: value.id.unwrap_or_else(Uuid::new_v4),
            name: value.name.trim().to_string(),
        }
    }
}

impl From<TeamInput> for Team {
    fn from(value: TeamInput) -> Self {
        Self {
            id: value.id.unwrap_or_else(Uuid::new_v4),
            name: value.name.trim().to_string(),
            roster: value.players.into_iter().map(Into::into).collect(),
        }
    }
}

/// Toss recorded by the scorer.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TossRequest {
    pub winner_id: Uuid,
    #[schema(value_type = String, example = "bat")]
    pub decision: TossDecision,
}

impl From<TossRequest> for Toss {
    fn from(value: TossRequest) -> Self {
        Self {
            winner: value.winner_id,
            decision: value.decision,
        }
    }
}

/// Coin toss performed by the backend.
///
/// `decision` is the election applied on behalf of whichever side wins the call.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FlipTossRequest {
    /// Side calling the coin.
    pub caller_id: Uuid,
    #[schema(value_type = String, example = "heads")]
    pub call: CoinFace,
    #[schema(value_type = String, example = "bowl")]
    pub decision: TossDecision,
}

/// Outcome of a recorded or flipped toss.
#[derive(Debug, Serialize, ToSchema)]
pub struct TossResponse {
    pub winner_id: Uuid,
    #[schema(value_type = String)]
    pub decision: TossDecision,
    /// Face the coin landed on, only for flipped tosses.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub landed: Option<CoinFace>,
    /// Side batting first.
    pub batting_team_id: Uuid,
    pub phase: VisibleMatchPhase,
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PlayerSummary {
    pub id: Uuid,
    pub name: String,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
    pub players: Vec<PlayerSummary>,
}

impl From<&Team> for TeamSummary {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id,
            name: team.name.clone(),
            players: team.roster.iter().map(PlayerSummary::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TossSummary {
    pub winner_id: Uuid,
    #[schema(value_type = String)]
    pub decision: TossDecision,
}

/// Result of a completed match.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct ResultSummary {
    /// `chasing_side_won`, `defending_side_won` or `tie`.
    pub outcome: String,
    /// Winning margin, in wickets or runs. Absent on a tie.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<u32>,
    pub winner_id: Option<Uuid>,
    pub text: String,
}

impl From<&MatchResult> for ResultSummary {
    fn from(result: &MatchResult) -> Self {
        let (outcome, margin) = match result.outcome {
            ResultOutcome::ChasingSideWon { wickets } => {
                ("chasing_side_won", Some(u32::from(wickets)))
            }
            ResultOutcome::DefendingSideWon { runs } => ("defending_side_won", Some(runs)),
            ResultOutcome::Tie => ("tie", None),
        };
        Self {
            outcome: outcome.to_string(),
            margin,
            winner_id: result.winner,
            text: result.text.clone(),
        }
    }
}

/// Summary returned once a match has been created or loaded.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchSummary {
    pub id: Uuid,
    pub name: String,
    pub created_at: String,
    pub status: MatchStatusDto,
    pub phase: VisibleMatchPhase,
    pub overs_per_innings: u16,
    /// Overs a single bowler may deliver.
    pub bowler_over_limit: u16,
    pub team_a: TeamSummary,
    pub team_b: TeamSummary,
    pub toss: Option<TossSummary>,
    pub result: Option<ResultSummary>,
}

impl From<&ScoringEngine> for MatchSummary {
    fn from(engine: &ScoringEngine) -> Self {
        let fixture = engine.fixture();
        let phase = engine.phase();
        Self {
            id: fixture.id,
            name: fixture.name.clone(),
            created_at: format_system_time(fixture.created_at),
            status: MatchStatus::from(phase).into(),
            phase: phase.into(),
            overs_per_innings: fixture.overs_per_innings,
            bowler_over_limit: fixture.bowler_over_limit,
            team_a: (&fixture.team_a).into(),
            team_b: (&fixture.team_b).into(),
            toss: fixture.toss.map(|toss| TossSummary {
                winner_id: toss.winner,
                decision: toss.decision,
            }),
            result: engine.result().map(ResultSummary::from),
        }
    }
}

/// Lightweight projection used by the match list.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchListItem {
    pub id: Uuid,
    pub name: String,
    pub status: MatchStatusDto,
    pub result_text: Option<String>,
}

impl From<MatchListItemEntity> for MatchListItem {
    fn from(entity: MatchListItemEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            status: MatchStatus::from(entity.status).into(),
            result_text: entity.result_text,
        }
    }
}
