use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{actions, CurrentUser};
use crate::entities::movement_record::Direction;
use crate::errors::ServiceError;
use crate::services::metrics::SummaryFilter;
use crate::services::movements::{MovementFilter, NewMovement};
use crate::{default_limit, default_page, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RecordMovementRequest {
    pub direction: Direction,
    #[validate(length(min = 1, max = 64))]
    pub material_ref: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub company: Option<String>,
    pub waybill_ref: Option<String>,
    /// Calendar date of the physical movement (business timezone)
    pub occurred_date: NaiveDate,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementListQuery {
    pub material_ref: Option<String>,
    pub company: Option<String>,
    pub direction: Option<Direction>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Admin-only: include soft-deleted rows
    #[serde(default)]
    pub include_deleted: bool,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SummaryListQuery {
    pub material_ref: Option<String>,
    pub company: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_movements).post(record_movement))
        .route("/summary", get(list_summary))
        .route("/:id", get(get_movement).delete(soft_delete_movement))
        .route("/:id/restore", post(restore_movement))
}

/// Record a stock entry or exit
#[utoipa::path(
    post,
    path = "/api/v1/movements",
    request_body = RecordMovementRequest,
    responses(
        (status = 201, description = "Movement recorded"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn record_movement(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<RecordMovementRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state.permissions.require(&user, actions::INVENTORY_CREATE).await?;
    req.validate()?;
    let record = state
        .movements
        .record(
            req.direction,
            NewMovement {
                material_ref: req.material_ref,
                quantity: req.quantity,
                company: req.company,
                waybill_ref: req.waybill_ref,
                occurred_date: req.occurred_date,
                note: req.note,
            },
            &user,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Raw chronological movement listing
#[utoipa::path(
    get,
    path = "/api/v1/movements",
    params(MovementListQuery),
    responses(
        (status = 200, description = "Movement rows returned"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<MovementListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    state.permissions.require(&user, actions::INVENTORY_VIEW).await?;
    if query.include_deleted && !user.role.is_admin() {
        return Err(ServiceError::Forbidden(
            "only administrators may list deleted movements".into(),
        ));
    }
    let (page, limit) = (query.page, query.limit);
    let (items, total) = state
        .movements
        .list_raw(
            MovementFilter {
                material_ref: query.material_ref,
                company: query.company,
                direction: query.direction,
                date_from: query.date_from,
                date_to: query.date_to,
                include_deleted: query.include_deleted,
            },
            page,
            limit,
        )
        .await?;
    Ok(Json(PaginatedResponse::new(items, total, page, limit)))
}

/// Summary listing: one row per material, latest movement plus global balance
#[utoipa::path(
    get,
    path = "/api/v1/movements/summary",
    params(SummaryListQuery),
    responses(
        (status = 200, description = "Summary rows returned"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn list_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SummaryListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    state.permissions.require(&user, actions::INVENTORY_VIEW).await?;
    let (page, limit) = (query.page, query.limit);
    let (items, total) = state
        .metrics
        .list_summary(
            SummaryFilter {
                material_ref: query.material_ref,
                company: query.company,
                date_from: query.date_from,
                date_to: query.date_to,
            },
            page,
            limit,
        )
        .await?;
    Ok(Json(PaginatedResponse::new(items, total, page, limit)))
}

/// Fetch one movement by id
#[utoipa::path(
    get,
    path = "/api/v1/movements/{id}",
    params(("id" = Uuid, Path, description = "Movement id")),
    responses(
        (status = 200, description = "Movement returned"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn get_movement(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.permissions.require(&user, actions::INVENTORY_VIEW).await?;
    let record = state.movements.get(id).await?;
    Ok(Json(record))
}

/// Soft-delete a movement (restorable, excluded from balances)
#[utoipa::path(
    delete,
    path = "/api/v1/movements/{id}",
    params(("id" = Uuid, Path, description = "Movement id")),
    responses(
        (status = 200, description = "Movement soft-deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn soft_delete_movement(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.permissions.require(&user, actions::INVENTORY_DELETE).await?;
    let record = state.movements.soft_delete(id, &user).await?;
    Ok(Json(record))
}

/// Restore a soft-deleted movement (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/movements/{id}/restore",
    params(("id" = Uuid, Path, description = "Movement id")),
    responses(
        (status = 200, description = "Movement restored"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn restore_movement(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.permissions.require(&user, actions::INVENTORY_RESTORE).await?;
    let record = state.movements.restore(id, &user).await?;
    Ok(Json(record))
}
