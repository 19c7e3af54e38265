use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{
        fixture::FixtureError,
        scoring::{AbortError, ApplyError, PlanError, ReplayError, TossError},
        state_machine::InvalidTransition,
    },
};

/// Failures of match setup and scoring operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The ball store failed or returned unusable rows.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// No ball store is installed and the match is not loaded.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Another writer changed the match first and retries ran out.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Setup or toss input that breaks a fixture rule.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The match phase does not allow the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Unknown match.
    #[error("not found: {0}")]
    NotFound(String),
    /// A store round-trip exceeded the configured deadline.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { .. } => ServiceError::Conflict(err.to_string()),
            StorageError::NotFound(id) => ServiceError::NotFound(format!("`{id}` not found")),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Errors returned by handlers, rendered as a JSON `{message}` body.
#[derive(Debug, Error)]
pub enum AppError {
    /// 400.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// 404.
    #[error("not found: {0}")]
    NotFound(String),
    /// 409: wrong phase, or a concurrent scorer won the race.
    #[error("conflict: {0}")]
    Conflict(String),
    /// 503.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// 500, for rows the engine cannot replay.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(StorageError::Corrupt(message)) => AppError::Internal(message),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidState("a delivery is already pending".into())
            }
            PlanError::Rejected(rejection) => ServiceError::InvalidInput(rejection.to_string()),
            PlanError::Replay(replay) => replay.into(),
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => ServiceError::InvalidState("no delivery is pending".into()),
            ApplyError::IdMismatch { .. } => {
                ServiceError::InvalidState("pending delivery does not match".into())
            }
        }
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending => ServiceError::InvalidState("no pending delivery".into()),
            AbortError::IdMismatch { .. } => {
                ServiceError::InvalidState("delivery plan does not match".into())
            }
        }
    }
}

impl From<ReplayError> for ServiceError {
    fn from(err: ReplayError) -> Self {
        ServiceError::Unavailable(StorageError::Corrupt(err.to_string()))
    }
}

impl From<FixtureError> for ServiceError {
    fn from(err: FixtureError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<TossError> for ServiceError {
    fn from(err: TossError) -> Self {
        match err {
            TossError::Fixture(fixture) => fixture.into(),
            TossError::Transition(transition) => transition.into(),
        }
    }
}
