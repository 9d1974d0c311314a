//! `GET /api/dlq`.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::collections::HashMap;
use wida_core::job::DlqEntry;

use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize, Default)]
pub struct ListDlqQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn list_dlq(
    State(state): State<AppState>,
    Query(query): Query<ListDlqQuery>,
) -> Result<Json<HashMap<String, Vec<DlqEntry>>>, ApiError> {
    let dlq = state
        .store
        .list_dlq(query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    let mut body = HashMap::new();
    body.insert("dlq".to_string(), dlq);
    Ok(Json(body))
}
