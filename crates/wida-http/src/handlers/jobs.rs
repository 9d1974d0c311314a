//! `POST /api/jobs/enqueue`, `GET /api/jobs/{id}`, `GET /api/jobs`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::collections::HashMap;
use wida_core::job::{Job, Status};

use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
pub struct ListJobsQuery {
    queue: Option<String>,
    status: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

pub async fn enqueue(
    State(state): State<AppState>,
    body: Result<Json<Job>, axum::extract::rejection::JsonRejection>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let Json(job) = body.map_err(|err| ApiError::bad_request(format!("invalid JSON payload: {err}")))?;

    let job = state.store.enqueue(job).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let job = state
        .store
        .get_job(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("job not found"))?;
    Ok(Json(job))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<HashMap<String, Vec<Job>>>, ApiError> {
    let status = query
        .status
        .map(|s| parse_status(&s))
        .transpose()
        .map_err(ApiError::bad_request)?;

    let filter = wida_core::JobFilter {
        queue: query.queue,
        status,
    };
    let jobs = state
        .store
        .list_jobs(&filter, query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;

    let mut body = HashMap::new();
    body.insert("jobs".to_string(), jobs);
    Ok(Json(body))
}

fn parse_status(raw: &str) -> Result<Status, String> {
    match raw {
        "pending" => Ok(Status::Pending),
        "running" => Ok(Status::Running),
        "success" => Ok(Status::Success),
        "failed" => Ok(Status::Failed),
        "dead" => Ok(Status::Dead),
        other => Err(format!("unknown status {other:?}")),
    }
}
