#![allow(dead_code)]

use std::sync::Arc;

use stockledger_api::auth::{CurrentUser, Role};
use stockledger_api::config::AppConfig;
use stockledger_api::{db, AppState};
use uuid::Uuid;

/// Fresh in-memory database with migrations applied, wrapped in the full
/// application state.
pub async fn test_state() -> AppState {
    let cfg = AppConfig::for_tests();
    let pool = db::establish_connection(&cfg).await.expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");
    AppState::new(Arc::new(pool), cfg)
}

pub fn admin() -> CurrentUser {
    CurrentUser {
        id: Uuid::new_v4(),
        role: Role::new("ADMIN"),
    }
}

pub fn operator() -> CurrentUser {
    CurrentUser {
        id: Uuid::new_v4(),
        role: Role::new("OPERATOR"),
    }
}
