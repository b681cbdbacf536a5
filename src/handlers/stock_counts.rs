use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{actions, CurrentUser};
use crate::entities::{stock_count_entry, stock_count_session};
use crate::errors::ServiceError;
use crate::services::stock_count::NewCount;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenSessionRequest {
    /// Business day for the session; defaults to today
    pub session_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitCountRequest {
    #[validate(length(min = 1, max = 64))]
    pub material_ref: String,
    #[validate(range(min = 0))]
    pub counted_quantity: i32,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SessionLookupQuery {
    /// When given, only the session for this day (404 when none exists)
    pub date: Option<NaiveDate>,
}

/// Session plus the display-only derived state used by listings:
/// a past-dated session never closed reads as "incomplete".
#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: stock_count_session::Model,
    pub incomplete: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionReport {
    #[serde(flatten)]
    pub session: stock_count_session::Model,
    pub entries: Vec<stock_count_entry::Model>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sessions).post(open_session))
        .route("/:id", get(get_session))
        .route("/:id/entries", post(submit_count))
        .route("/:id/close", post(close_session))
}

/// Open (or return) the caller's session for a business day
#[utoipa::path(
    post,
    path = "/api/v1/stock-counts",
    request_body = OpenSessionRequest,
    responses(
        (status = 201, description = "Session opened or returned"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-counts"
)]
pub async fn open_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<OpenSessionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .permissions
        .require(&user, actions::STOCKCOUNT_MANAGE)
        .await?;
    let session = state
        .stock_counts
        .open_session(&user, req.session_date)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Session history (admins see all users)
#[utoipa::path(
    get,
    path = "/api/v1/stock-counts",
    params(SessionLookupQuery),
    responses(
        (status = 200, description = "Sessions returned"),
        (status = 404, description = "No session for the requested day", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-counts"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SessionLookupQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .permissions
        .require(&user, actions::STOCKCOUNT_MANAGE)
        .await?;
    let today = state.stock_counts.business_today();
    if let Some(date) = query.date {
        // A day with no session is "none", not an implicit creation.
        let session = state
            .stock_counts
            .find_session(user.id, date)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no session for {}", date)))?;
        let incomplete = session.is_incomplete(today);
        return Ok(Json(vec![SessionView {
            session,
            incomplete,
        }]));
    }
    let sessions = state.stock_counts.list_history(&user).await?;
    let views = sessions
        .into_iter()
        .map(|session| {
            let incomplete = session.is_incomplete(today);
            SessionView {
                session,
                incomplete,
            }
        })
        .collect::<Vec<_>>();
    Ok(Json(views))
}

/// Session comparison report: counted vs system quantities
#[utoipa::path(
    get,
    path = "/api/v1/stock-counts/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session report"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-counts"
)]
pub async fn get_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .permissions
        .require(&user, actions::STOCKCOUNT_MANAGE)
        .await?;
    let (session, entries) = state.stock_counts.session_report(&user, id).await?;
    Ok(Json(SessionReport { session, entries }))
}

/// Submit (or overwrite) a count for one material in a session
#[utoipa::path(
    post,
    path = "/api/v1/stock-counts/{id}/entries",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = SubmitCountRequest,
    responses(
        (status = 200, description = "Count recorded"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Session completed", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-counts"
)]
pub async fn submit_count(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitCountRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .permissions
        .require(&user, actions::STOCKCOUNT_MANAGE)
        .await?;
    req.validate()?;
    let entry = state
        .stock_counts
        .submit_count(
            &user,
            id,
            NewCount {
                material_ref: req.material_ref,
                counted_quantity: req.counted_quantity,
                note: req.note,
            },
        )
        .await?;
    Ok(Json(entry))
}

/// Complete a session; afterwards it is a read-only report
#[utoipa::path(
    post,
    path = "/api/v1/stock-counts/{id}/close",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session completed"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-counts"
)]
pub async fn close_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .permissions
        .require(&user, actions::STOCKCOUNT_MANAGE)
        .await?;
    let session = state.stock_counts.close_session(&user, id).await?;
    Ok(Json(session))
}
