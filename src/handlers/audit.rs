use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::{actions, CurrentUser};
use crate::errors::ServiceError;
use crate::services::audit::AuditFilter;
use crate::{default_limit, default_page, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditListQuery {
    pub entity: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<String>,
    pub user_id: Option<Uuid>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_audit))
}

/// Audit trail listing, newest first
#[utoipa::path(
    get,
    path = "/api/v1/audit",
    params(AuditListQuery),
    responses(
        (status = 200, description = "Audit entries returned"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "audit"
)]
pub async fn list_audit(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<AuditListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    state.permissions.require(&user, actions::AUDIT_VIEW).await?;
    let (page, limit) = (query.page, query.limit);
    let (items, total) = state
        .audit
        .list(
            AuditFilter {
                entity: query.entity,
                entity_id: query.entity_id,
                action: query.action,
                user_id: query.user_id,
            },
            page,
            limit,
        )
        .await?;
    Ok(Json(PaginatedResponse::new(items, total, page, limit)))
}
