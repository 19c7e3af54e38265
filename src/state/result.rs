//! Match result determination.

use crate::state::fixture::{Team, TeamId};

/// How the second innings ended relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOutcome {
    /// Chasing side passed the target with wickets in hand.
    ChasingSideWon {
        /// Wickets remaining.
        wickets: u16,
    },
    /// Chasing side fell short.
    DefendingSideWon {
        /// Margin in runs.
        runs: u32,
    },
    /// Scores level.
    Tie,
}

/// Final outcome of a completed match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Structured outcome.
    pub outcome: ResultOutcome,
    /// Winning side, absent on a tie.
    pub winner: Option<TeamId>,
    /// Human readable summary.
    pub text: String,
}

/// Decide the outcome from both innings totals.
///
/// `roster_size` is the size of the chasing side and `wickets_lost` the wickets
/// it lost.
pub fn compute_result(
    innings1_total: u32,
    innings2_total: u32,
    wickets_lost: u16,
    roster_size: usize,
) -> ResultOutcome {
    if innings2_total > innings1_total {
        let available = u16::try_from(roster_size.saturating_sub(1)).unwrap_or(u16::MAX);
        ResultOutcome::ChasingSideWon {
            wickets: available.saturating_sub(wickets_lost),
        }
    } else if innings2_total < innings1_total {
        ResultOutcome::DefendingSideWon {
            runs: innings1_total - innings2_total,
        }
    } else {
        ResultOutcome::Tie
    }
}

impl MatchResult {
    /// Attach winner and summary text to an outcome.
    pub fn describe(outcome: ResultOutcome, chasing: &Team, defending: &Team) -> Self {
        match outcome {
            ResultOutcome::ChasingSideWon { wickets } => Self {
                outcome,
                winner: Some(chasing.id),
                text: format!(
                    "{} won by {} {}",
                    chasing.name,
                    wickets,
                    plural(u32::from(wickets), "wicket")
                ),
            },
            ResultOutcome::DefendingSideWon { runs } => Self {
                outcome,
                winner: Some(defending.id),
                text: format!("{} won by {} {}", defending.name, runs, plural(runs, "run")),
            },
            ResultOutcome::Tie => Self {
                outcome,
                winner: None,
                text: "Match tied".to_string(),
            },
        }
    }
}

fn plural(count: u32, noun: &str) -> String {
    if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}
