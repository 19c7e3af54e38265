use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Mount point of the Swagger UI.
pub const SWAGGER_UI_PATH: &str = "/docs";
/// Route serving the raw OpenAPI document.
pub const OPENAPI_JSON_PATH: &str = "/api-doc/openapi.json";

/// Serve the Swagger UI for the match and scoring API.
pub fn router(state: SharedState) -> Router<SharedState> {
    let swagger = SwaggerUi::new(SWAGGER_UI_PATH).url(OPENAPI_JSON_PATH, ApiDoc::openapi());
    Router::<SharedState>::from(swagger).with_state(state)
}
