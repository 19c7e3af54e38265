//! Derived statistics folded incrementally from ball events.

use indexmap::IndexMap;

use crate::state::{
    ball::{BALLS_PER_OVER, BallEvent, Delivery},
    fixture::PlayerId,
};

/// Running totals of one innings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InningsTally {
    /// Runs off the bat.
    pub runs: u32,
    /// Extras conceded.
    pub extras: u32,
    /// Batsmen dismissed.
    pub wickets: u16,
    /// Deliveries that count towards the over.
    pub legal_balls: u32,
    /// Every delivery, legal or not.
    pub deliveries: u32,
}

impl InningsTally {
    /// Fold one delivery into the tally.
    pub fn record(&mut self, delivery: &Delivery) {
        self.runs += u32::from(delivery.runs());
        self.extras += u32::from(delivery.extras());
        self.deliveries += 1;
        if delivery.is_legal() {
            self.legal_balls += 1;
        }
        if delivery.dismissal().is_some() {
            self.wickets += 1;
        }
    }

    /// Runs plus extras.
    pub fn total(&self) -> u32 {
        self.runs + self.extras
    }

    /// Fully bowled overs.
    pub fn completed_overs(&self) -> u32 {
        self.legal_balls / BALLS_PER_OVER
    }

    /// Legal balls bowled in the current over.
    pub fn balls_in_over(&self) -> u32 {
        self.legal_balls % BALLS_PER_OVER
    }

    /// `overs.balls` notation, e.g. `18.3`.
    pub fn overs(&self) -> String {
        overs_notation(self.legal_balls)
    }

    /// Runs per over, absent until a legal ball has been bowled.
    pub fn run_rate(&self) -> Option<f64> {
        if self.legal_balls == 0 {
            return None;
        }
        let overs = f64::from(self.legal_balls) / f64::from(BALLS_PER_OVER);
        Some(f64::from(self.total()) / overs)
    }
}

/// `overs.balls` notation for a count of legal balls.
pub fn overs_notation(legal_balls: u32) -> String {
    format!(
        "{}.{}",
        legal_balls / BALLS_PER_OVER,
        legal_balls % BALLS_PER_OVER
    )
}

/// Per-player figures for the match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerMatchState {
    /// Runs credited while on strike (runs plus extras of each delivery faced).
    pub runs_scored: u32,
    /// Deliveries faced, extras included.
    pub balls_faced: u32,
    /// Runs plus extras conceded while bowling.
    pub runs_conceded: u32,
    /// Legal balls bowled.
    pub balls_bowled: u32,
    /// Dismissals credited to this bowler.
    pub wickets: u16,
    /// Whether the player has been dismissed.
    pub dismissed: bool,
}

impl PlayerMatchState {
    /// Overs bowled, counting a partial over as a whole one.
    pub fn overs_started(&self) -> u32 {
        self.balls_bowled.div_ceil(BALLS_PER_OVER)
    }
}

/// Figures of every player who has taken part, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scorecard {
    players: IndexMap<PlayerId, PlayerMatchState>,
}

impl Scorecard {
    /// Fold one event into the batting and bowling figures.
    pub fn record(&mut self, event: &BallEvent) {
        let delivery = &event.delivery;
        let total = delivery.total();

        let striker = self.players.entry(event.striker).or_default();
        striker.runs_scored += total;
        striker.balls_faced += 1;

        self.players.entry(event.non_striker).or_default();

        let bowler = self.players.entry(event.bowler).or_default();
        bowler.runs_conceded += total;
        if delivery.is_legal() {
            bowler.balls_bowled += 1;
        }

        if let Some((kind, dismissed)) = delivery.dismissal() {
            if kind.credits_bowler() {
                self.players.entry(event.bowler).or_default().wickets += 1;
            }
            self.players.entry(dismissed).or_default().dismissed = true;
        }
    }

    /// Figures of one player, zeroed when they have not taken part.
    pub fn player(&self, id: PlayerId) -> PlayerMatchState {
        self.players.get(&id).cloned().unwrap_or_default()
    }

    /// Whether the player has already been dismissed.
    pub fn is_dismissed(&self, id: PlayerId) -> bool {
        self.players.get(&id).is_some_and(|state| state.dismissed)
    }

    /// Iterate over every recorded player.
    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &PlayerMatchState)> {
        self.players.iter()
    }
}
