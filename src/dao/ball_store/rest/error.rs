//! Error types shared by the REST storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`RestDaoError`] failures.
pub type RestResult<T> = Result<T, RestDaoError>;

/// Failures that can occur while interacting with the REST backend.
#[derive(Debug, Error)]
pub enum RestDaoError {
    /// Required environment variable is missing.
    #[error("missing REST store environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build REST store client")]
    ClientBuilder {
        /// Client error.
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send REST store request to `{path}`")]
    RequestSend {
        /// Table path queried.
        path: String,
        /// Transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The backend returned an unexpected status code.
    #[error("unexpected REST store response status {status} for `{path}`")]
    RequestStatus {
        /// Table path queried.
        path: String,
        /// Status returned.
        status: StatusCode,
    },
    /// Response payload could not be decoded.
    #[error("failed to decode REST store response for `{path}`")]
    DecodeResponse {
        /// Table path queried.
        path: String,
        /// Decoding error.
        #[source]
        source: reqwest::Error,
    },
}

impl From<RestDaoError> for StorageError {
    fn from(err: RestDaoError) -> Self {
        match err {
            RestDaoError::DecodeResponse { .. } => StorageError::Corrupt(err.to_string()),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
