//! Thin HTTP surface over a [`wida_core::JobStore`]: enqueue, query, DLQ
//! listing, and scheduler leadership status. This crate owns no
//! retry/claim/scheduling logic, it only translates HTTP requests into
//! store calls and maps errors to status codes. The router is assembled
//! in a small function, handlers split one-per-file under `handlers/`,
//! with a permissive CORS layer via `tower-http`.

mod error;
mod handlers;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use wida_core::{JobStore, LeaderElection};

/// Shared state every handler extracts via `State<AppState>`. Cheap to
/// clone — both fields are already `Arc`-wrapped trait objects.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub election: Option<Arc<dyn LeaderElection>>,
}

/// Builds the five `/api/...` routes plus a permissive CORS layer with
/// `OPTIONS` preflight returning `200`.
pub fn build_router(store: Arc<dyn JobStore>, election: Option<Arc<dyn LeaderElection>>) -> Router {
    let state = AppState { store, election };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/jobs/enqueue", post(handlers::jobs::enqueue))
        .route("/api/jobs/:id", get(handlers::jobs::get_job))
        .route("/api/jobs", get(handlers::jobs::list_jobs))
        .route("/api/workers", get(handlers::workers::list_workers))
        .route("/api/dlq", get(handlers::dlq::list_dlq))
        .route("/api/scheduler", get(handlers::scheduler::get_scheduler))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;
    use wida_testing::InMemoryJobStore;

    fn app() -> Router {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        build_router(store, None)
    }

    #[tokio::test]
    async fn enqueue_then_fetch_round_trips() {
        let app = app();

        let payload = json!({
            "id": "job-1",
            "queue": "default",
            "payload": {"n": 1},
            "status": "pending",
            "retry_policy": {"initial_interval": 1000, "max_interval": 10000, "max_attempts": 5},
            "timeout": 30000,
            "max_retries": 5,
            "attempts": [],
            "dependencies": [],
            "dependents": [],
            "created_at": "2026-01-01T00:00:00Z",
        });

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/jobs/enqueue")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/jobs/job-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let job: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(job["id"], "job-1");
    }

    #[tokio::test]
    async fn get_unknown_job_is_404() {
        let app = app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/jobs/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_enqueue_body_is_400() {
        let app = app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/jobs/enqueue")
                    .header("content-type", "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn scheduler_status_defaults_to_not_leader() {
        let app = app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/scheduler")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status["is_leader"], false);
    }
}
