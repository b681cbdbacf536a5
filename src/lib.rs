//! Stock Ledger & Reconciliation Engine
//!
//! Tracks physical stock movements per material reference, derives
//! balances and stock metrics purely from the movement history, and runs
//! periodic physical stock-count reconciliation against those balances.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod calendar;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod migrator;
pub mod openapi;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::auth::PermissionService;
use crate::config::AppConfig;
use crate::services::audit::AuditService;
use crate::services::metrics::StockMetricsService;
use crate::services::movements::MovementService;
use crate::services::stock_count::StockCountService;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub movements: Arc<MovementService>,
    pub metrics: Arc<StockMetricsService>,
    pub stock_counts: Arc<StockCountService>,
    pub audit: Arc<AuditService>,
    pub permissions: Arc<PermissionService>,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: AppConfig) -> Self {
        let movements = Arc::new(MovementService::new(db.clone()));
        let metrics = Arc::new(StockMetricsService::new(
            db.clone(),
            config.dead_stock_days,
            config.business_tz_offset_minutes,
        ));
        let stock_counts = Arc::new(StockCountService::new(
            db.clone(),
            config.business_tz_offset_minutes,
        ));
        let audit = Arc::new(AuditService::new(db.clone()));
        let permissions = Arc::new(PermissionService::new(
            db.clone(),
            Duration::from_secs(config.permission_cache_ttl_secs),
        ));
        Self {
            db,
            config,
            movements,
            metrics,
            stock_counts,
            audit,
            permissions,
        }
    }
}

pub fn default_page() -> u64 {
    1
}

pub fn default_limit() -> u64 {
    20
}

/// Standard paginated envelope: `{items, total, page, limit}`.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        Self {
            items,
            total,
            page,
            limit,
        }
    }
}

/// Assembles the full application router.
pub fn app(state: AppState) -> Router {
    use tower_http::compression::CompressionLayer;
    use tower_http::cors::CorsLayer;
    use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
    use tower_http::timeout::TimeoutLayer;
    use tower_http::trace::TraceLayer;

    Router::new()
        .nest("/api/v1/movements", handlers::movements::router())
        .nest("/api/v1/stock-counts", handlers::stock_counts::router())
        .nest("/api/v1/metrics", handlers::metrics::router())
        .nest("/api/v1/audit", handlers::audit::router())
        .nest("/api/v1/permissions", handlers::permissions::router())
        .merge(health::router())
        .merge(openapi::swagger_ui())
        // First layer added is innermost; request-id assignment must wrap
        // tracing so spans carry the id.
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
