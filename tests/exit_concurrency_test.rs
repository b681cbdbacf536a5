//! Concurrency check for the exit gateway against a real Postgres.
//!
//! Run with a scratch database:
//!   TEST_DATABASE_URL=postgres://... cargo test --test exit_concurrency_test -- --ignored

mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use stockledger_api::config::AppConfig;
use stockledger_api::entities::movement_record::Direction;
use stockledger_api::errors::ServiceError;
use stockledger_api::services::movements::NewMovement;
use stockledger_api::{db, AppState};

fn movement(quantity: i32) -> NewMovement {
    NewMovement {
        material_ref: "CONC-REF".to_string(),
        quantity,
        company: None,
        waybill_ref: None,
        occurred_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        note: None,
    }
}

#[tokio::test]
#[ignore = "needs TEST_DATABASE_URL pointing at a scratch Postgres"]
async fn concurrent_exits_never_oversell() {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL");
    let cfg = AppConfig {
        database_url: url,
        ..AppConfig::for_tests()
    };
    let pool = db::establish_connection(&cfg).await.expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");
    let state = AppState::new(Arc::new(pool), cfg);
    let user = common::operator();

    state
        .movements
        .record(Direction::Entry, movement(100), &user)
        .await
        .expect("seed entry");

    // 20 workers each try to take 10; only 10 may succeed.
    let mut handles = Vec::new();
    for _ in 0..20 {
        let movements = state.movements.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            movements.record(Direction::Exit, movement(10), &user).await
        }));
    }

    let mut succeeded = 0u32;
    for handle in handles {
        match handle.await.expect("task") {
            Ok(_) => succeeded += 1,
            Err(ServiceError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(state.metrics.balance("CONC-REF").await.unwrap(), 0);
}
