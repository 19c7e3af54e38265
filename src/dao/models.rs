use serde::{Deserialize, Serialize};
use serde_with::{TimestampMilliSeconds, serde_as};
use std::time::SystemTime;
use uuid::Uuid;

/// Player row embedded inside a team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Stable identifier for the player.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

/// Team definition embedded inside a match row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name chosen for the team.
    pub name: String,
    /// Ordered roster.
    pub players: Vec<PlayerEntity>,
}

/// Election made by the toss winner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TossDecisionEntity {
    Bat,
    Bowl,
}

/// Toss outcome stored with the match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TossEntity {
    /// Team that won the toss.
    pub winner_id: Uuid,
    /// Whether the winner elected to bat or bowl.
    pub decision: TossDecisionEntity,
}

/// Persisted lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatusEntity {
    AwaitingToss,
    InProgress,
    Completed,
}

/// Aggregate match row persisted by the storage layer.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Display name of the fixture.
    pub name: String,
    /// Creation timestamp for auditing/debugging.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub created_at: SystemTime,
    /// Last time the match row was updated.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub updated_at: SystemTime,
    /// First side.
    pub team_a: TeamEntity,
    /// Second side.
    pub team_b: TeamEntity,
    /// Legal overs per innings.
    pub overs_per_innings: u16,
    /// Overs a single bowler may deliver.
    pub bowler_over_limit: u16,
    /// Toss outcome once recorded.
    #[serde(default)]
    pub toss: Option<TossEntity>,
    /// Lifecycle status.
    pub status: MatchStatusEntity,
    /// Free-text outcome once completed.
    #[serde(default)]
    pub result_text: Option<String>,
    /// Winning team once completed (absent on a tie).
    #[serde(default)]
    pub winner_id: Option<Uuid>,
}

/// Match list projection (subset of [`MatchEntity`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchListItemEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Display name of the fixture.
    pub name: String,
    /// Lifecycle status.
    pub status: MatchStatusEntity,
    /// Free-text outcome once completed.
    #[serde(default)]
    pub result_text: Option<String>,
}

impl From<MatchEntity> for MatchListItemEntity {
    fn from(entity: MatchEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            status: entity.status,
            result_text: entity.result_text,
        }
    }
}

/// Terminal or intermediate status change applied to a match row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchStatusUpdate {
    /// Match being updated.
    pub match_id: Uuid,
    /// New lifecycle status.
    pub status: MatchStatusEntity,
    /// Outcome text when completed.
    pub result_text: Option<String>,
    /// Winner when completed and not tied.
    pub winner_id: Option<Uuid>,
}

/// Flat ball-event row as stored by the backend.
///
/// Optional columns depend on the delivery kind; the domain layer converts this
/// into a tagged variant and rejects contradictory rows.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BallEventEntity {
    /// Primary key (client-generated until confirmed).
    pub id: Uuid,
    /// Owning match.
    pub match_id: Uuid,
    /// Innings number (1 or 2).
    pub innings: u8,
    /// Side batting when the ball was bowled.
    pub batting_team_id: Uuid,
    /// Per-match contiguous sequence number starting at 1.
    pub sequence: u64,
    /// Completed overs before this delivery.
    pub over: u16,
    /// Ball number within the over (legal deliveries only advance it).
    pub ball: u8,
    /// Batsman on strike.
    pub striker_id: Uuid,
    /// Batsman at the non-striker's end.
    pub non_striker_id: Uuid,
    /// Bowler of the delivery.
    pub bowler_id: Uuid,
    /// Runs off the bat.
    pub runs: u8,
    /// Extras conceded (non-zero marks an illegal delivery).
    #[serde(default)]
    pub extras: u8,
    /// Kind of extra (`wide`, `no_ball`).
    #[serde(default)]
    pub extra_kind: Option<String>,
    /// Whether a batsman was dismissed.
    #[serde(default)]
    pub is_wicket: bool,
    /// Kind of dismissal.
    #[serde(default)]
    pub wicket_kind: Option<String>,
    /// Dismissed batsman (striker or non-striker).
    #[serde(default)]
    pub dismissed_id: Option<Uuid>,
    /// Fielder involved in the dismissal.
    #[serde(default)]
    pub fielder_id: Option<Uuid>,
    /// When the ball was recorded.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub recorded_at: SystemTime,
}
