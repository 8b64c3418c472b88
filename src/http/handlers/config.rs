use axum::extract::State;
use axum::Json;

use crate::config::EffectiveConfig;
use crate::http::state::AppState;

/// `GET /v1/config` and `GET /config` — the effective config as JSON. No
/// secrets exist in the MVP, so this is safe to expose unauthenticated.
pub async fn get_config(State(state): State<AppState>) -> Json<EffectiveConfig> {
    Json((*state.config).clone())
}
