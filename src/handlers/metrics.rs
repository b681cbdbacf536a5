use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::{actions, CurrentUser};
use crate::errors::ServiceError;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct MetricsQuery {
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_metrics))
}

/// Ledger-derived stock metrics report
#[utoipa::path(
    get,
    path = "/api/v1/metrics",
    params(MetricsQuery),
    responses(
        (status = 200, description = "Metrics report", body = crate::services::metrics::MetricsReport),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "metrics"
)]
pub async fn get_metrics(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<MetricsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    state.permissions.require(&user, actions::REPORTS_VIEW).await?;
    let report = state
        .metrics
        .metrics(query.period_start, query.period_end)
        .await?;
    Ok(Json(report))
}
