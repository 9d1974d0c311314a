//! `GET /api/workers`.

use axum::extract::State;
use axum::Json;
use std::collections::HashMap;
use wida_core::job::WorkerStats;

use crate::error::ApiError;
use crate::AppState;

pub async fn list_workers(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, Vec<WorkerStats>>>, ApiError> {
    let workers = state.store.list_workers().await?;
    let mut body = HashMap::new();
    body.insert("workers".to_string(), workers);
    Ok(Json(body))
}
