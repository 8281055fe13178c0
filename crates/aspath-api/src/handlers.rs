//! REST API handlers.
//!
//! Each handler calls the query facade (or the schedule registry) and wraps
//! the result in the JSON envelope.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use aspath_state::SnapshotId;

use crate::ApiState;
use crate::query::QueryError;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn query_error(e: QueryError) -> Response {
    if e.is_not_found() {
        return error_response(&e.to_string(), StatusCode::NOT_FOUND).into_response();
    }
    warn!(error = %e, "query failed");
    error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

/// Run a blocking store read on the blocking pool, so slow scans neither
/// stall the async workers nor escape the request timeout.
async fn blocking<T, F>(f: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!(error = %e, "blocking query task failed");
        error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
    })
}

/// GET /
pub async fn root() -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({ "Hello": "from ASPATH project" }))
}

/// GET /scheduler/
pub async fn list_schedules(State(state): State<ApiState>) -> impl IntoResponse {
    let registry = state.registry;
    match blocking(move || registry.list()).await {
        Ok(Ok(entries)) => ApiResponse::ok(entries).into_response(),
        Ok(Err(e)) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
        Err(resp) => resp,
    }
}

// ── Exchange points & collectors ───────────────────────────────

/// GET /exchange-points/
pub async fn list_exchange_points(State(state): State<ApiState>) -> impl IntoResponse {
    let query = state.query;
    match blocking(move || query.list_exchange_points()).await {
        Ok(Ok(summaries)) => ApiResponse::ok(summaries).into_response(),
        Ok(Err(e)) => query_error(e),
        Err(resp) => resp,
    }
}

/// GET /route-collectors/
pub async fn list_route_collectors(State(state): State<ApiState>) -> impl IntoResponse {
    let query = state.query;
    match blocking(move || query.list_collectors()).await {
        Ok(Ok(collectors)) => ApiResponse::ok(collectors).into_response(),
        Ok(Err(e)) => query_error(e),
        Err(resp) => resp,
    }
}

// ── Snapshots ──────────────────────────────────────────────────

/// GET /route-collectors/:name/snapshots/
pub async fn list_snapshots(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let query = state.query;
    match blocking(move || query.list_snapshots(&name)).await {
        Ok(Ok(snapshots)) => ApiResponse::ok(snapshots).into_response(),
        Ok(Err(e)) => query_error(e),
        Err(resp) => resp,
    }
}

/// GET /route-collectors/:name/snapshots/latest/routes
pub async fn latest_routes(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let query = state.query;
    match blocking(move || query.latest_routes(&name)).await {
        Ok(Ok(routes)) => ApiResponse::ok(routes).into_response(),
        Ok(Err(e)) => query_error(e),
        Err(resp) => resp,
    }
}

/// GET /route-collectors/:name/snapshots/:id/routes
pub async fn snapshot_routes(
    State(state): State<ApiState>,
    Path((name, id)): Path<(String, SnapshotId)>,
) -> impl IntoResponse {
    let query = state.query;
    match blocking(move || query.snapshot_routes(&name, id)).await {
        Ok(Ok(routes)) => ApiResponse::ok(routes).into_response(),
        Ok(Err(e)) => query_error(e),
        Err(resp) => resp,
    }
}

// ── Statistics ─────────────────────────────────────────────────

/// GET /statistics
pub async fn statistics(State(state): State<ApiState>) -> impl IntoResponse {
    let query = state.query;
    match blocking(move || query.statistics()).await {
        Ok(Ok(stats)) => ApiResponse::ok(stats).into_response(),
        Ok(Err(e)) => query_error(e),
        Err(resp) => resp,
    }
}
