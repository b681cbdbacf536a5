//! Liveness and readiness probes.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use sea_orm::{ConnectionTrait, Statement};
use serde_json::json;
use tracing::error;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
}

/// Basic up/down status
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up")),
    tag = "health"
)]
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "up", "timestamp": Utc::now().to_rfc3339() }))
}

async fn live() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness: verifies the database answers a trivial query.
async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.db.get_database_backend();
    match state
        .db
        .execute(Statement::from_string(backend, "SELECT 1"))
        .await
    {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            error!(error = %e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "down" })),
            )
        }
    }
}
