use thiserror::Error;

use crate::state::{ball::InningsNumber, fixture::TeamId, result::MatchResult};

/// High-level phases a match moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Match created; the toss has not been recorded.
    AwaitingToss,
    /// Opening innings in progress.
    FirstInnings,
    /// Opening innings closed; waiting for the chase to start.
    InningsBreak,
    /// Chasing innings in progress.
    SecondInnings,
    /// Result decided; no further deliveries.
    Completed,
}

impl MatchPhase {
    /// Whether deliveries may currently be scored.
    pub fn is_in_play(self) -> bool {
        matches!(self, MatchPhase::FirstInnings | MatchPhase::SecondInnings)
    }
}

/// Which side bats and which bowls in the current (or upcoming) innings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InningsContext {
    /// Innings number.
    pub number: InningsNumber,
    /// Batting side.
    pub batting: TeamId,
    /// Bowling side.
    pub bowling: TeamId,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    /// Toss recorded; the opening sides are known.
    TossDecided {
        /// Side batting first.
        batting: TeamId,
        /// Side bowling first.
        bowling: TeamId,
    },
    /// Opening innings ended (all out or overs complete) with this total.
    InningsClosed {
        /// Runs plus extras of the opening innings.
        total: u32,
    },
    /// Scorer acknowledged the break and the chase begins.
    SecondInningsOpened,
    /// Chase ended with this result.
    MatchDecided(MatchResult),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: MatchPhase,
    /// The event that cannot be applied from this phase.
    pub event: MatchEvent,
}

/// Phase value object: the only way to change phase, innings sides or target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchStateMachine {
    phase: MatchPhase,
    innings: Option<InningsContext>,
    target: Option<u32>,
    result: Option<MatchResult>,
    version: usize,
}

impl Default for MatchStateMachine {
    fn default() -> Self {
        Self {
            phase: MatchPhase::AwaitingToss,
            innings: None,
            target: None,
            result: None,
            version: 0,
        }
    }
}

impl MatchStateMachine {
    /// Create a new state machine waiting for the toss.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Sides of the current innings (or of the chase during the break).
    pub fn innings(&self) -> Option<InningsContext> {
        self.innings
    }

    /// Runs the chasing side must pass, fixed when the opening innings closes.
    pub fn target(&self) -> Option<u32> {
        self.target
    }

    /// Result once the match is decided.
    pub fn result(&self) -> Option<&MatchResult> {
        self.result.as_ref()
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Apply an event, returning the new phase.
    pub fn apply(&mut self, event: MatchEvent) -> Result<MatchPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        *self = next;
        Ok(self.phase)
    }

    /// Compute the state reached by applying `event`, if the transition is valid.
    fn compute_transition(&self, event: MatchEvent) -> Result<Self, InvalidTransition> {
        let version = self.version + 1;
        let next = match (self.phase, event) {
            (MatchPhase::AwaitingToss, MatchEvent::TossDecided { batting, bowling }) => Self {
                phase: MatchPhase::FirstInnings,
                innings: Some(InningsContext {
                    number: InningsNumber::First,
                    batting,
                    bowling,
                }),
                target: None,
                result: None,
                version,
            },
            (MatchPhase::FirstInnings, MatchEvent::InningsClosed { total }) => {
                let innings = self.innings.map(|current| InningsContext {
                    number: InningsNumber::Second,
                    batting: current.bowling,
                    bowling: current.batting,
                });
                Self {
                    phase: MatchPhase::InningsBreak,
                    innings,
                    target: Some(total),
                    result: None,
                    version,
                }
            }
            (MatchPhase::InningsBreak, MatchEvent::SecondInningsOpened) => Self {
                phase: MatchPhase::SecondInnings,
                version,
                ..self.clone()
            },
            (MatchPhase::SecondInnings, MatchEvent::MatchDecided(result)) => Self {
                phase: MatchPhase::Completed,
                result: Some(result),
                version,
                ..self.clone()
            },
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
