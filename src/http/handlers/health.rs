use axum::extract::State;
use axum::Json;

use crate::http::response::HealthResponse;
use crate::http::state::AppState;

/// `GET /health` — always 200 while the process is accepting connections.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: state.version.to_string() })
}
