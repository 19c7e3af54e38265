use serde::Serialize;
use utoipa::ToSchema;

/// Payload of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" while a ball store answers, "degraded" otherwise.
    pub status: String,
    /// Matches whose engine is held in memory.
    pub loaded_matches: usize,
}

impl HealthResponse {
    /// Build the payload from the degraded flag and the loaded match count.
    pub fn new(degraded: bool, loaded_matches: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            loaded_matches,
        }
    }
}
