mod common;

use chrono::NaiveDate;
use sea_orm::{ActiveModelTrait, Set};
use stockledger_api::auth::actions;
use stockledger_api::services::audit::AuditFilter;
use stockledger_api::entities::material_definition;
use stockledger_api::entities::movement_record::Direction;
use stockledger_api::services::metrics::{StockState, SummaryFilter};
use stockledger_api::services::movements::NewMovement;

fn movement(material_ref: &str, quantity: i32, day: u32) -> NewMovement {
    NewMovement {
        material_ref: material_ref.to_string(),
        quantity,
        company: Some("Acme Metals".to_string()),
        waybill_ref: None,
        occurred_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        note: None,
    }
}

async fn define_material(state: &stockledger_api::AppState, reference: &str, min_stock: i32) {
    material_definition::ActiveModel {
        reference: Set(reference.to_string()),
        min_stock: Set(min_stock),
        abc_class: Set(Some("A".to_string())),
        default_location: Set(Some("A-01-01".to_string())),
        unit: Set(Some("pcs".to_string())),
        description: Set(None),
    }
    .insert(state.db.as_ref())
    .await
    .expect("definition");
}

#[tokio::test]
async fn balance_of_unknown_reference_is_zero() {
    let state = common::test_state().await;
    assert_eq!(state.metrics.balance("NOPE").await.unwrap(), 0);
}

#[tokio::test]
async fn summary_uses_definition_threshold_or_default() {
    let state = common::test_state().await;
    let user = common::operator();

    // REF-A has a custom threshold of 5; 8 on hand is fine.
    define_material(&state, "REF-A", 5).await;
    state
        .movements
        .record(Direction::Entry, movement("REF-A", 8, 1), &user)
        .await
        .unwrap();
    // REF-B has no definition; 8 on hand is below the default of 20.
    state
        .movements
        .record(Direction::Entry, movement("REF-B", 8, 2), &user)
        .await
        .unwrap();

    let (rows, total) = state
        .metrics
        .list_summary(SummaryFilter::default(), 1, 50)
        .await
        .unwrap();
    assert_eq!(total, 2);

    let a = rows.iter().find(|r| r.material_ref == "REF-A").unwrap();
    assert_eq!(a.min_stock, 5);
    assert_eq!(a.state, StockState::Ok);
    assert_eq!(a.unit.as_deref(), Some("pcs"));

    let b = rows.iter().find(|r| r.material_ref == "REF-B").unwrap();
    assert_eq!(b.min_stock, 20);
    assert_eq!(b.state, StockState::Low);
    assert!(b.unit.is_none());
}

#[tokio::test]
async fn summary_orders_by_newest_activity_and_paginates() {
    let state = common::test_state().await;
    let user = common::operator();

    state
        .movements
        .record(Direction::Entry, movement("OLD-REF", 50, 1), &user)
        .await
        .unwrap();
    state
        .movements
        .record(Direction::Entry, movement("NEW-REF", 50, 9), &user)
        .await
        .unwrap();

    let (rows, total) = state
        .metrics
        .list_summary(SummaryFilter::default(), 1, 1)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].material_ref, "NEW-REF");

    let (rows, _) = state
        .metrics
        .list_summary(SummaryFilter::default(), 2, 1)
        .await
        .unwrap();
    assert_eq!(rows[0].material_ref, "OLD-REF");
}

#[tokio::test]
async fn summary_ref_filter_is_exact_after_normalization() {
    let state = common::test_state().await;
    let user = common::operator();

    state
        .movements
        .record(Direction::Entry, movement("REF-1", 5, 1), &user)
        .await
        .unwrap();
    state
        .movements
        .record(Direction::Entry, movement("REF-10", 5, 2), &user)
        .await
        .unwrap();

    // Exact after normalization: REF-1 must not pull in REF-10.
    let (rows, total) = state
        .metrics
        .list_summary(
            SummaryFilter {
                material_ref: Some("ref-1".to_string()),
                ..Default::default()
            },
            1,
            50,
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].material_ref, "REF-1");

    // Company stays a case-insensitive substring match.
    let (_, total) = state
        .metrics
        .list_summary(
            SummaryFilter {
                company: Some("acme".to_string()),
                ..Default::default()
            },
            1,
            50,
        )
        .await
        .unwrap();
    assert_eq!(total, 2);
}

#[tokio::test]
async fn metrics_report_reflects_the_ledger() {
    let state = common::test_state().await;
    let user = common::operator();

    state
        .movements
        .record(Direction::Entry, movement("REF-1", 100, 1), &user)
        .await
        .unwrap();
    state
        .movements
        .record(Direction::Exit, movement("REF-1", 30, 2), &user)
        .await
        .unwrap();
    state
        .movements
        .record(Direction::Exit, movement("REF-1", 60, 3), &user)
        .await
        .unwrap();
    state
        .movements
        .record(Direction::Entry, movement("REF-2", 40, 4), &user)
        .await
        .unwrap();

    let report = state.metrics.metrics(None, None).await.unwrap();
    assert_eq!(report.total_materials, 2);
    assert_eq!(report.total_balance, 50); // 10 + 40
    assert_eq!(report.total_entry_volume, 140);
    assert_eq!(report.total_exit_volume, 90);
    // REF-1 sits at 10, below the default threshold of 20.
    assert_eq!(report.low_stock_count, 1);
    assert_eq!(report.status_breakdown.low, 1);
    assert_eq!(report.status_breakdown.ok, 1);
    assert_eq!(report.anomaly_count, 0);

    assert_eq!(report.top_movers[0].material_ref, "REF-1");
    assert_eq!(report.top_movers[0].movement_count, 3);

    assert_eq!(report.monthly_activity.len(), 1);
    assert_eq!(report.monthly_activity[0].entry_volume, 140);
    assert_eq!(report.monthly_activity[0].exit_volume, 90);
}

#[tokio::test]
async fn metrics_monthly_buckets_respect_the_period() {
    let state = common::test_state().await;
    let user = common::operator();

    state
        .movements
        .record(
            Direction::Entry,
            NewMovement {
                material_ref: "REF-1".to_string(),
                quantity: 100,
                company: None,
                waybill_ref: None,
                occurred_date: NaiveDate::from_ymd_opt(2023, 11, 10).unwrap(),
                note: None,
            },
            &user,
        )
        .await
        .unwrap();
    state
        .movements
        .record(Direction::Entry, movement("REF-1", 40, 5), &user)
        .await
        .unwrap();

    let report = state
        .metrics
        .metrics(
            Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            Some(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()),
        )
        .await
        .unwrap();
    // The November 2023 movement is outside the queried period.
    assert_eq!(report.monthly_activity.len(), 1);
    assert_eq!(report.monthly_activity[0].year, 2024);
    assert_eq!(report.monthly_activity[0].month, 3);
    assert_eq!(report.monthly_activity[0].entry_volume, 40);
}

#[tokio::test]
async fn grants_take_effect_despite_the_read_cache() {
    let state = common::test_state().await;
    let user = common::operator();

    // First check populates the cache with an empty action set.
    assert!(state
        .permissions
        .require(&user, actions::INVENTORY_CREATE)
        .await
        .is_err());

    state
        .permissions
        .grant(None, &user.role, actions::INVENTORY_CREATE)
        .await
        .unwrap();
    assert!(state
        .permissions
        .require(&user, actions::INVENTORY_CREATE)
        .await
        .is_ok());
    // Granting twice stays a single row and keeps working.
    state
        .permissions
        .grant(None, &user.role, actions::INVENTORY_CREATE)
        .await
        .unwrap();

    state
        .permissions
        .revoke(None, &user.role, actions::INVENTORY_CREATE)
        .await
        .unwrap();
    assert!(state
        .permissions
        .require(&user, actions::INVENTORY_CREATE)
        .await
        .is_err());

    // The duplicate grant was a no-op, so the trail holds one grant and
    // one revoke.
    let (_, grants) = state
        .audit
        .list(
            AuditFilter {
                action: Some("PERMISSION_GRANT".to_string()),
                ..Default::default()
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(grants, 1);
    let (_, revokes) = state
        .audit
        .list(
            AuditFilter {
                action: Some("PERMISSION_REVOKE".to_string()),
                ..Default::default()
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(revokes, 1);
}

#[tokio::test]
async fn admin_bypasses_the_permission_table() {
    let state = common::test_state().await;
    let admin = common::admin();
    for action in actions::ALL {
        assert!(state.permissions.require(&admin, action).await.is_ok());
    }
}
