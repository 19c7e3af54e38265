use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the ball store and report whether scoring can reach it.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_store().await {
        Ok(store) => {
            if let Err(err) = state.with_store_timeout(store.health_check()).await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    HealthResponse::new(state.is_degraded(), state.loaded_matches().len())
}
