use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{actions, CurrentUser, Role};
use crate::errors::ServiceError;
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PermissionEditRequest {
    #[validate(length(min = 1, max = 64))]
    pub role: String,
    #[validate(length(min = 1, max = 64))]
    pub action: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/grant", post(grant_permission))
        .route("/revoke", post(revoke_permission))
}

fn validate_action(action: &str) -> Result<(), ServiceError> {
    if actions::ALL.contains(&action) {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(format!(
            "unknown action {}",
            action
        )))
    }
}

/// Grant an action to a role (takes effect on the next request)
#[utoipa::path(
    post,
    path = "/api/v1/permissions/grant",
    request_body = PermissionEditRequest,
    responses(
        (status = 200, description = "Permission granted"),
        (status = 400, description = "Unknown action", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "permissions"
)]
pub async fn grant_permission(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<PermissionEditRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .permissions
        .require(&user, actions::PERMISSIONS_MANAGE)
        .await?;
    req.validate()?;
    validate_action(&req.action)?;
    let role = Role::new(&req.role);
    state
        .permissions
        .grant(Some(user.id), &role, &req.action)
        .await?;
    Ok(Json(json!({ "role": role.as_str(), "action": req.action, "granted": true })))
}

/// Revoke an action from a role (cache invalidated synchronously)
#[utoipa::path(
    post,
    path = "/api/v1/permissions/revoke",
    request_body = PermissionEditRequest,
    responses(
        (status = 200, description = "Permission revoked"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "permissions"
)]
pub async fn revoke_permission(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<PermissionEditRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .permissions
        .require(&user, actions::PERMISSIONS_MANAGE)
        .await?;
    req.validate()?;
    let role = Role::new(&req.role);
    state
        .permissions
        .revoke(Some(user.id), &role, &req.action)
        .await?;
    Ok(Json(json!({ "role": role.as_str(), "action": req.action, "granted": false })))
}
