use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stock Ledger API",
        version = "0.3.0",
        description = "Warehouse stock ledger and reconciliation engine. \
            Movements are an append-only event log; balances and metrics are \
            derived by folding that history, and physical stock counts are \
            reconciled against the ledger in bounded sessions."
    ),
    paths(
        crate::handlers::movements::record_movement,
        crate::handlers::movements::list_movements,
        crate::handlers::movements::list_summary,
        crate::handlers::movements::get_movement,
        crate::handlers::movements::soft_delete_movement,
        crate::handlers::movements::restore_movement,
        crate::handlers::metrics::get_metrics,
        crate::handlers::stock_counts::open_session,
        crate::handlers::stock_counts::list_sessions,
        crate::handlers::stock_counts::get_session,
        crate::handlers::stock_counts::submit_count,
        crate::handlers::stock_counts::close_session,
        crate::handlers::audit::list_audit,
        crate::handlers::permissions::grant_permission,
        crate::handlers::permissions::revoke_permission,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::handlers::movements::RecordMovementRequest,
        crate::handlers::stock_counts::OpenSessionRequest,
        crate::handlers::stock_counts::SubmitCountRequest,
        crate::handlers::permissions::PermissionEditRequest,
        crate::entities::movement_record::Direction,
        crate::services::metrics::MetricsReport,
        crate::services::metrics::StatusBreakdown,
        crate::services::metrics::TopMover,
        crate::services::metrics::MonthlyActivity,
        crate::services::metrics::StockState,
    )),
    tags(
        (name = "movements", description = "Stock movement ledger"),
        (name = "metrics", description = "Ledger-derived metrics"),
        (name = "stock-counts", description = "Physical count reconciliation"),
        (name = "audit", description = "Immutable audit trail"),
        (name = "permissions", description = "Role permission table"),
        (name = "health", description = "Probes")
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
