//! `GET /api/scheduler`.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct SchedulerStatus {
    is_leader: bool,
}

pub async fn get_scheduler(State(state): State<AppState>) -> Json<SchedulerStatus> {
    let is_leader = state
        .election
        .as_ref()
        .map(|election| election.is_leader())
        .unwrap_or(false);
    Json(SchedulerStatus { is_leader })
}
