use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{fixture::MatchStatus, scoring::Prompt, state_machine::MatchPhase};

/// Publicly visible match phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleMatchPhase {
    /// Toss not recorded yet.
    AwaitingToss,
    /// Opening innings under way.
    FirstInnings,
    /// Between the innings.
    InningsBreak,
    /// Chase under way.
    SecondInnings,
    /// Result decided.
    Completed,
}

impl From<MatchPhase> for VisibleMatchPhase {
    fn from(value: MatchPhase) -> Self {
        match value {
            MatchPhase::AwaitingToss => VisibleMatchPhase::AwaitingToss,
            MatchPhase::FirstInnings => VisibleMatchPhase::FirstInnings,
            MatchPhase::InningsBreak => VisibleMatchPhase::InningsBreak,
            MatchPhase::SecondInnings => VisibleMatchPhase::SecondInnings,
            MatchPhase::Completed => VisibleMatchPhase::Completed,
        }
    }
}

/// Persisted lifecycle status.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatusDto {
    /// Toss not recorded yet.
    AwaitingToss,
    /// Balls being scored.
    InProgress,
    /// Result decided.
    Completed,
}

impl From<MatchStatus> for MatchStatusDto {
    fn from(value: MatchStatus) -> Self {
        match value {
            MatchStatus::AwaitingToss => MatchStatusDto::AwaitingToss,
            MatchStatus::InProgress => MatchStatusDto::InProgress,
            MatchStatus::Completed => MatchStatusDto::Completed,
        }
    }
}

impl From<MatchPhase> for MatchStatus {
    fn from(value: MatchPhase) -> Self {
        match value {
            MatchPhase::AwaitingToss => MatchStatus::AwaitingToss,
            MatchPhase::Completed => MatchStatus::Completed,
            MatchPhase::FirstInnings | MatchPhase::InningsBreak | MatchPhase::SecondInnings => {
                MatchStatus::InProgress
            }
        }
    }
}

/// Mandatory prompt the scoring UI must resolve.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PromptDto {
    /// Nothing to resolve.
    None,
    /// Record the toss.
    RecordToss,
    /// Pick both openers and the opening bowler.
    SelectOpeners,
    /// Pick the bowler of the next over.
    SelectBowler,
    /// Pick the incoming batsman.
    SelectNewBatsman,
    /// Acknowledge the innings break.
    InningsComplete,
    /// Match over.
    MatchComplete,
}

impl From<Prompt> for PromptDto {
    fn from(value: Prompt) -> Self {
        match value {
            Prompt::None => PromptDto::None,
            Prompt::RecordToss => PromptDto::RecordToss,
            Prompt::SelectOpeners => PromptDto::SelectOpeners,
            Prompt::SelectBowler => PromptDto::SelectBowler,
            Prompt::SelectNewBatsman => PromptDto::SelectNewBatsman,
            Prompt::InningsComplete => PromptDto::InningsComplete,
            Prompt::MatchComplete => PromptDto::MatchComplete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_serialize_in_kebab_case() {
        let json = serde_json::to_string(&PromptDto::from(Prompt::SelectNewBatsman)).unwrap();
        assert_eq!(json, "\"select-new-batsman\"");
    }

    #[test]
    fn innings_break_is_still_in_progress() {
        assert_eq!(
            MatchStatus::from(MatchPhase::InningsBreak),
            MatchStatus::InProgress
        );
    }
}
