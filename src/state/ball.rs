//! Ball events: the append-only unit of scoring.

use std::{fmt, str::FromStr, time::SystemTime};

use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::BallEventEntity,
    state::fixture::{MatchId, PlayerId, TeamId},
};

/// Highest number of runs that can be scored off the bat from one delivery.
pub const MAX_RUNS_PER_BALL: u8 = 6;
/// Legal deliveries in one over.
pub const BALLS_PER_OVER: u32 = 6;

/// First or second innings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InningsNumber {
    /// Opening innings.
    First,
    /// Chasing innings.
    Second,
}

impl InningsNumber {
    /// Zero-based position used to index per-innings tallies.
    pub fn index(self) -> usize {
        match self {
            InningsNumber::First => 0,
            InningsNumber::Second => 1,
        }
    }

    /// One-based number as stored by the backend.
    pub fn as_u8(self) -> u8 {
        match self {
            InningsNumber::First => 1,
            InningsNumber::Second => 2,
        }
    }
}

impl TryFrom<u8> for InningsNumber {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(InningsNumber::First),
            2 => Ok(InningsNumber::Second),
            other => Err(other),
        }
    }
}

/// Illegal delivery kinds. Neither counts towards the over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraKind {
    /// Wide ball.
    Wide,
    /// No ball.
    NoBall,
}

impl ExtraKind {
    /// Column value used by the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            ExtraKind::Wide => "wide",
            ExtraKind::NoBall => "no_ball",
        }
    }
}

impl FromStr for ExtraKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "wide" => Ok(ExtraKind::Wide),
            "no_ball" => Ok(ExtraKind::NoBall),
            other => Err(other.to_string()),
        }
    }
}

/// Modes of dismissal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WicketKind {
    /// Stumps broken by the delivery.
    Bowled,
    /// Ball caught on the full.
    Caught,
    /// Leg before wicket.
    Lbw,
    /// Batsman short of the crease while running.
    RunOut,
    /// Keeper breaks the stumps with the batsman out of his ground.
    Stumped,
    /// Batsman breaks his own stumps.
    HitWicket,
}

impl WicketKind {
    /// Whether the dismissal counts towards the bowler's wickets.
    pub fn credits_bowler(self) -> bool {
        !matches!(self, WicketKind::RunOut)
    }

    /// Column value used by the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            WicketKind::Bowled => "bowled",
            WicketKind::Caught => "caught",
            WicketKind::Lbw => "lbw",
            WicketKind::RunOut => "run_out",
            WicketKind::Stumped => "stumped",
            WicketKind::HitWicket => "hit_wicket",
        }
    }
}

impl FromStr for WicketKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bowled" => Ok(WicketKind::Bowled),
            "caught" => Ok(WicketKind::Caught),
            "lbw" => Ok(WicketKind::Lbw),
            "run_out" => Ok(WicketKind::RunOut),
            "stumped" => Ok(WicketKind::Stumped),
            "hit_wicket" => Ok(WicketKind::HitWicket),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for WicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Legal delivery with runs off the bat (possibly zero).
    Runs {
        /// Runs off the bat.
        runs: u8,
    },
    /// Illegal delivery: advances the score, not the over.
    Extra {
        /// Wide or no ball.
        kind: ExtraKind,
        /// Penalty runs, at least one.
        extras: u8,
        /// Runs off the bat (no ball hit for runs).
        runs: u8,
    },
    /// Legal delivery on which a batsman was dismissed.
    Wicket {
        /// Mode of dismissal.
        kind: WicketKind,
        /// Batsman given out, striker or non-striker.
        dismissed: PlayerId,
        /// Fielder involved, if any.
        fielder: Option<PlayerId>,
        /// Runs completed before the dismissal.
        runs: u8,
    },
}

impl Delivery {
    /// Runs off the bat.
    pub fn runs(&self) -> u8 {
        match *self {
            Delivery::Runs { runs } | Delivery::Extra { runs, .. } | Delivery::Wicket { runs, .. } => {
                runs
            }
        }
    }

    /// Extras conceded.
    pub fn extras(&self) -> u8 {
        match *self {
            Delivery::Extra { extras, .. } => extras,
            _ => 0,
        }
    }

    /// Runs plus extras added to the batting total.
    pub fn total(&self) -> u32 {
        u32::from(self.runs()) + u32::from(self.extras())
    }

    /// Whether the delivery counts towards the over.
    pub fn is_legal(&self) -> bool {
        self.extras() == 0
    }

    /// Dismissal carried by the delivery.
    pub fn dismissal(&self) -> Option<(WicketKind, PlayerId)> {
        match *self {
            Delivery::Wicket {
                kind, dismissed, ..
            } => Some((kind, dismissed)),
            _ => None,
        }
    }
}

/// One accepted delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallEvent {
    /// Identifier, client-side until the store confirms it.
    pub id: Uuid,
    /// Owning match.
    pub match_id: MatchId,
    /// Innings the ball belongs to.
    pub innings: InningsNumber,
    /// Side batting.
    pub batting_team: TeamId,
    /// Per-match contiguous sequence number.
    pub sequence: u64,
    /// Completed overs before this delivery.
    pub over: u16,
    /// Ball number within the over.
    pub ball: u8,
    /// Batsman on strike.
    pub striker: PlayerId,
    /// Batsman at the other end.
    pub non_striker: PlayerId,
    /// Bowler.
    pub bowler: PlayerId,
    /// What happened.
    pub delivery: Delivery,
    /// When it was recorded.
    pub recorded_at: SystemTime,
}

impl BallEvent {
    /// Stable replay order: innings, over, ball, then insertion.
    pub fn order_key(&self) -> (InningsNumber, u16, u8, u64) {
        (self.innings, self.over, self.ball, self.sequence)
    }
}

/// What the scorer selected for the next delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BallSelection {
    /// Batsman on strike.
    pub striker: Option<PlayerId>,
    /// Batsman at the other end.
    pub non_striker: Option<PlayerId>,
    /// Bowler.
    pub bowler: Option<PlayerId>,
    /// Outcome of the delivery.
    pub delivery: Option<Delivery>,
}

/// Stored rows that cannot be expressed as a [`BallEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// Innings column outside 1..=2.
    #[error("ball `{id}` has invalid innings {value}")]
    InvalidInnings {
        /// Offending row.
        id: Uuid,
        /// Stored value.
        value: u8,
    },
    /// Extras recorded without saying which kind.
    #[error("ball `{id}` records extras without an extra kind")]
    MissingExtraKind {
        /// Offending row.
        id: Uuid,
    },
    /// Unrecognised extra kind.
    #[error("ball `{id}` has unknown extra kind `{value}`")]
    UnknownExtraKind {
        /// Offending row.
        id: Uuid,
        /// Stored value.
        value: String,
    },
    /// Wicket flag without a dismissed batsman.
    #[error("ball `{id}` is a wicket without a dismissed batsman")]
    MissingDismissed {
        /// Offending row.
        id: Uuid,
    },
    /// Wicket flag without a dismissal mode.
    #[error("ball `{id}` is a wicket without a wicket kind")]
    MissingWicketKind {
        /// Offending row.
        id: Uuid,
    },
    /// Unrecognised dismissal mode.
    #[error("ball `{id}` has unknown wicket kind `{value}`")]
    UnknownWicketKind {
        /// Offending row.
        id: Uuid,
        /// Stored value.
        value: String,
    },
    /// Wicket recorded on a wide or no ball.
    #[error("ball `{id}` records a wicket on an illegal delivery")]
    WicketOnExtra {
        /// Offending row.
        id: Uuid,
    },
}

impl TryFrom<BallEventEntity> for BallEvent {
    type Error = RowError;

    fn try_from(row: BallEventEntity) -> Result<Self, Self::Error> {
        let id = row.id;
        let innings = InningsNumber::try_from(row.innings)
            .map_err(|value| RowError::InvalidInnings { id, value })?;

        let delivery = match (row.is_wicket, row.extras) {
            (true, 0) => {
                let dismissed = row.dismissed_id.ok_or(RowError::MissingDismissed { id })?;
                let raw_kind = row
                    .wicket_kind
                    .ok_or(RowError::MissingWicketKind { id })?;
                let kind = raw_kind
                    .parse::<WicketKind>()
                    .map_err(|value| RowError::UnknownWicketKind { id, value })?;
                Delivery::Wicket {
                    kind,
                    dismissed,
                    fielder: row.fielder_id,
                    runs: row.runs,
                }
            }
            (true, _) => return Err(RowError::WicketOnExtra { id }),
            (false, 0) => Delivery::Runs { runs: row.runs },
            (false, extras) => {
                let raw_kind = row.extra_kind.ok_or(RowError::MissingExtraKind { id })?;
                let kind = raw_kind
                    .parse::<ExtraKind>()
                    .map_err(|value| RowError::UnknownExtraKind { id, value })?;
                Delivery::Extra {
                    kind,
                    extras,
                    runs: row.runs,
                }
            }
        };

        Ok(Self {
            id,
            match_id: row.match_id,
            innings,
            batting_team: row.batting_team_id,
            sequence: row.sequence,
            over: row.over,
            ball: row.ball,
            striker: row.striker_id,
            non_striker: row.non_striker_id,
            bowler: row.bowler_id,
            delivery,
            recorded_at: row.recorded_at,
        })
    }
}

impl From<BallEvent> for BallEventEntity {
    fn from(event: BallEvent) -> Self {
        let (extra_kind, wicket_kind, dismissed_id, fielder_id) = match event.delivery {
            Delivery::Runs { .. } => (None, None, None, None),
            Delivery::Extra { kind, .. } => (Some(kind.as_str().to_string()), None, None, None),
            Delivery::Wicket {
                kind,
                dismissed,
                fielder,
                ..
            } => (None, Some(kind.as_str().to_string()), Some(dismissed), fielder),
        };

        Self {
            id: event.id,
            match_id: event.match_id,
            innings: event.innings.as_u8(),
            batting_team_id: event.batting_team,
            sequence: event.sequence,
            over: event.over,
            ball: event.ball,
            striker_id: event.striker,
            non_striker_id: event.non_striker,
            bowler_id: event.bowler,
            runs: event.delivery.runs(),
            extras: event.delivery.extras(),
            extra_kind,
            is_wicket: event.delivery.dismissal().is_some(),
            wicket_kind,
            dismissed_id,
            fielder_id,
            recorded_at: event.recorded_at,
        }
    }
}
