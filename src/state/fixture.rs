//! Match fixture: the two sides, their rosters, the format and the toss.

use std::{collections::HashSet, time::SystemTime};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{
    MatchEntity, MatchStatusEntity, PlayerEntity, TeamEntity, TossDecisionEntity, TossEntity,
};

/// Identifier of a match.
pub type MatchId = Uuid;
/// Identifier of a team.
pub type TeamId = Uuid;
/// Identifier of a player.
pub type PlayerId = Uuid;

/// Conventional divisor used to derive how many overs a single bowler may bowl.
const OVERS_PER_BOWLER_DIVISOR: u16 = 5;

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Stable identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
}

/// One side of the fixture with its ordered roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Stable identifier.
    pub id: TeamId,
    /// Display name.
    pub name: String,
    /// Players in batting-order preference.
    pub roster: Vec<Player>,
}

impl Team {
    /// Whether `player` belongs to this side.
    pub fn has_player(&self, player: PlayerId) -> bool {
        self.roster.iter().any(|candidate| candidate.id == player)
    }

    /// Number of players on the roster.
    pub fn roster_size(&self) -> usize {
        self.roster.len()
    }

    /// Look up the display name of a player of this side.
    pub fn player_name(&self, player: PlayerId) -> Option<&str> {
        self.roster
            .iter()
            .find(|candidate| candidate.id == player)
            .map(|candidate| candidate.name.as_str())
    }
}

/// What the toss winner elected to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TossDecision {
    /// Winner bats first.
    Bat,
    /// Winner bowls first.
    Bowl,
}

/// Recorded toss outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toss {
    /// Team that won the toss.
    pub winner: TeamId,
    /// Election made by the winner.
    pub decision: TossDecision,
}

/// Face of the coin used for the toss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinFace {
    /// Heads.
    Heads,
    /// Tails.
    Tails,
}

/// Persisted lifecycle status of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// Created, toss not yet recorded.
    AwaitingToss,
    /// Toss recorded, balls being scored.
    InProgress,
    /// Result decided.
    Completed,
}

/// Reasons a fixture cannot be set up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    /// Match or team name is blank.
    #[error("{0} name must not be empty")]
    EmptyName(&'static str),
    /// Both sides share the same identifier.
    #[error("both teams share the identifier `{0}`")]
    SameTeams(TeamId),
    /// A side has no players.
    #[error("team `{0}` has an empty roster")]
    EmptyRoster(String),
    /// A side cannot field a not-out partner.
    #[error("team `{0}` needs at least two players")]
    RosterTooSmall(String),
    /// A player is listed more than once.
    #[error("player `{0}` is listed more than once")]
    DuplicatePlayer(PlayerId),
    /// Innings length must be positive.
    #[error("overs per innings must be strictly positive")]
    ZeroOvers,
    /// The side cannot bowl the innings within the per-bowler limit.
    #[error("team `{team}` cannot bowl {overs} overs with {limit} overs per bowler")]
    NotEnoughBowlers {
        /// Side that falls short.
        team: String,
        /// Innings length.
        overs: u16,
        /// Overs allowed per bowler.
        limit: u16,
    },
    /// Toss names a team that is not part of the fixture.
    #[error("team `{0}` is not part of this match")]
    UnknownTeam(TeamId),
}

/// Immutable setup of a match plus the toss once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    /// Match identifier.
    pub id: MatchId,
    /// Display name.
    pub name: String,
    /// First side.
    pub team_a: Team,
    /// Second side.
    pub team_b: Team,
    /// Legal overs per innings.
    pub overs_per_innings: u16,
    /// Maximum overs a single bowler may deliver.
    pub bowler_over_limit: u16,
    /// Toss outcome, when recorded.
    pub toss: Option<Toss>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl Fixture {
    /// Validate and build a new fixture, deriving the bowler over limit.
    pub fn new(
        name: String,
        team_a: Team,
        team_b: Team,
        overs_per_innings: u16,
        bowler_over_cap: Option<u16>,
    ) -> Result<Self, FixtureError> {
        let fixture = Self {
            id: Uuid::new_v4(),
            name,
            team_a,
            team_b,
            overs_per_innings,
            bowler_over_limit: bowler_over_limit(overs_per_innings, bowler_over_cap),
            toss: None,
            created_at: SystemTime::now(),
        };
        fixture.validate()?;
        fixture.ensure_bowling_depth()?;
        Ok(fixture)
    }

    /// Each side must have enough bowlers to deliver a full innings under the over limit.
    ///
    /// Stored fixtures skip this check so that matches created earlier keep loading.
    fn ensure_bowling_depth(&self) -> Result<(), FixtureError> {
        let overs = self.overs_per_innings;
        let limit = self.bowler_over_limit;
        for team in [&self.team_a, &self.team_b] {
            let capacity = team.roster_size().saturating_mul(usize::from(limit));
            if capacity < usize::from(overs) {
                return Err(FixtureError::NotEnoughBowlers {
                    team: team.name.clone(),
                    overs,
                    limit,
                });
            }
        }
        Ok(())
    }

    /// Check the structural invariants of the fixture.
    pub fn validate(&self) -> Result<(), FixtureError> {
        if self.name.trim().is_empty() {
            return Err(FixtureError::EmptyName("match"));
        }
        if self.team_a.id == self.team_b.id {
            return Err(FixtureError::SameTeams(self.team_a.id));
        }
        if self.overs_per_innings == 0 {
            return Err(FixtureError::ZeroOvers);
        }

        let mut seen = HashSet::new();
        for team in [&self.team_a, &self.team_b] {
            if team.name.trim().is_empty() {
                return Err(FixtureError::EmptyName("team"));
            }
            match team.roster_size() {
                0 => return Err(FixtureError::EmptyRoster(team.name.clone())),
                1 => return Err(FixtureError::RosterTooSmall(team.name.clone())),
                _ => {}
            }
            for player in &team.roster {
                if !seen.insert(player.id) {
                    return Err(FixtureError::DuplicatePlayer(player.id));
                }
            }
        }

        if let Some(toss) = self.toss {
            self.ensure_team(toss.winner)?;
        }

        Ok(())
    }

    /// Return the side identified by `id`, falling back to the second side.
    ///
    /// Callers only pass identifiers taken from this fixture.
    pub fn side(&self, id: TeamId) -> &Team {
        if self.team_a.id == id {
            &self.team_a
        } else {
            &self.team_b
        }
    }

    /// Return the side facing `id`.
    pub fn opponent(&self, id: TeamId) -> &Team {
        if self.team_a.id == id {
            &self.team_b
        } else {
            &self.team_a
        }
    }

    /// Fail unless `id` names one of the two sides.
    pub fn ensure_team(&self, id: TeamId) -> Result<(), FixtureError> {
        if id == self.team_a.id || id == self.team_b.id {
            Ok(())
        } else {
            Err(FixtureError::UnknownTeam(id))
        }
    }

    /// Batting and bowling side of the first innings, once the toss is known.
    pub fn opening_sides(&self) -> Option<(TeamId, TeamId)> {
        let toss = self.toss?;
        let winner = toss.winner;
        let loser = self.opponent(winner).id;
        Some(match toss.decision {
            TossDecision::Bat => (winner, loser),
            TossDecision::Bowl => (loser, winner),
        })
    }

    /// Display name of any player of the fixture.
    pub fn player_name(&self, player: PlayerId) -> Option<&str> {
        self.team_a
            .player_name(player)
            .or_else(|| self.team_b.player_name(player))
    }

    /// Team a player belongs to.
    pub fn team_of(&self, player: PlayerId) -> Option<TeamId> {
        [&self.team_a, &self.team_b]
            .into_iter()
            .find(|team| team.has_player(player))
            .map(|team| team.id)
    }
}

/// Overs a single bowler may deliver: a fifth of the innings, rounded up, never below one.
pub fn bowler_over_limit(overs_per_innings: u16, cap: Option<u16>) -> u16 {
    let limit = overs_per_innings.div_ceil(OVERS_PER_BOWLER_DIVISOR).max(1);
    match cap {
        Some(cap) => limit.min(cap.max(1)),
        None => limit,
    }
}

/// Flip a coin for the toss and return the face plus the winning team.
pub fn flip_coin<R: Rng + ?Sized>(
    rng: &mut R,
    caller: TeamId,
    call: CoinFace,
    opponent: TeamId,
) -> (CoinFace, TeamId) {
    let landed = if rng.random_bool(0.5) {
        CoinFace::Heads
    } else {
        CoinFace::Tails
    };
    let winner = if landed == call { caller } else { opponent };
    (landed, winner)
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

impl From<TeamEntity> for Team {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            roster: value.players.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Team> for TeamEntity {
    fn from(value: Team) -> Self {
        Self {
            id: value.id,
            name: value.name,
            players: value.roster.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<TossEntity> for Toss {
    fn from(value: TossEntity) -> Self {
        Self {
            winner: value.winner_id,
            decision: match value.decision {
                TossDecisionEntity::Bat => TossDecision::Bat,
                TossDecisionEntity::Bowl => TossDecision::Bowl,
            },
        }
    }
}

impl From<Toss> for TossEntity {
    fn from(value: Toss) -> Self {
        Self {
            winner_id: value.winner,
            decision: match value.decision {
                TossDecision::Bat => TossDecisionEntity::Bat,
                TossDecision::Bowl => TossDecisionEntity::Bowl,
            },
        }
    }
}

impl From<MatchStatusEntity> for MatchStatus {
    fn from(value: MatchStatusEntity) -> Self {
        match value {
            MatchStatusEntity::AwaitingToss => MatchStatus::AwaitingToss,
            MatchStatusEntity::InProgress => MatchStatus::InProgress,
            MatchStatusEntity::Completed => MatchStatus::Completed,
        }
    }
}

impl From<MatchStatus> for MatchStatusEntity {
    fn from(value: MatchStatus) -> Self {
        match value {
            MatchStatus::AwaitingToss => MatchStatusEntity::AwaitingToss,
            MatchStatus::InProgress => MatchStatusEntity::InProgress,
            MatchStatus::Completed => MatchStatusEntity::Completed,
        }
    }
}

impl TryFrom<MatchEntity> for Fixture {
    type Error = FixtureError;

    fn try_from(value: MatchEntity) -> Result<Self, Self::Error> {
        let fixture = Self {
            id: value.id,
            name: value.name,
            team_a: value.team_a.into(),
            team_b: value.team_b.into(),
            overs_per_innings: value.overs_per_innings,
            bowler_over_limit: value.bowler_over_limit.max(1),
            toss: value.toss.map(Into::into),
            created_at: value.created_at,
        };
        fixture.validate()?;
        Ok(fixture)
    }
}

impl Fixture {
    /// Build the persisted representation carrying the given lifecycle status.
    pub fn to_entity(&self, status: MatchStatus) -> MatchEntity {
        MatchEntity {
            id: self.id,
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: SystemTime::now(),
            team_a: self.team_a.clone().into(),
            team_b: self.team_b.clone().into(),
            overs_per_innings: self.overs_per_innings,
            bowler_over_limit: self.bowler_over_limit,
            toss: self.toss.map(Into::into),
            status: status.into(),
            result_text: None,
            winner_id: None,
        }
    }
}
