use axum::extract::{Path, State};
use axum::Json;

use crate::http::error::AppError;
use crate::http::response::{ModelEntry, ModelsListResponse};
use crate::http::state::AppState;
use crate::models::{ModelId, ALL_MODEL_IDS};

fn entry(id: ModelId) -> ModelEntry {
    ModelEntry { id: id.as_str().to_string(), object: "model", owned_by: "openai" }
}

/// `GET /v1/models` — enumerate the closed model id set.
pub async fn list_models(State(_state): State<AppState>) -> Json<ModelsListResponse> {
    Json(ModelsListResponse {
        object: "list",
        data: ALL_MODEL_IDS.iter().copied().map(entry).collect(),
    })
}

/// `GET /v1/models/{id}` — 200 iff `id` is in the closed set
/// (case-insensitive), 404 otherwise.
pub async fn get_model(
    State(_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ModelEntry>, AppError> {
    match ModelId::normalize(&id) {
        Some(model) => Ok(Json(entry(model))),
        None => Err(AppError::ModelRouteNotFound(id)),
    }
}
