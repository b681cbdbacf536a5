mod common;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use stockledger_api::entities::movement_record::Direction;
use stockledger_api::errors::ServiceError;
use stockledger_api::services::audit::AuditFilter;
use stockledger_api::services::movements::{MovementFilter, NewMovement};

fn movement(material_ref: &str, quantity: i32, day: u32) -> NewMovement {
    NewMovement {
        material_ref: material_ref.to_string(),
        quantity,
        company: Some("Acme Metals".to_string()),
        waybill_ref: Some(format!("WB-{:04}", day)),
        occurred_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        note: None,
    }
}

#[tokio::test]
async fn entry_then_exit_keeps_ledger_balance() {
    let state = common::test_state().await;
    let user = common::operator();

    state
        .movements
        .record(Direction::Entry, movement("ref-1", 100, 1), &user)
        .await
        .expect("entry");
    state
        .movements
        .record(Direction::Exit, movement("REF-1", 30, 2), &user)
        .await
        .expect("exit");

    // Case-insensitive reference matching; balance from the fold.
    assert_eq!(state.metrics.balance("Ref-1").await.unwrap(), 70);
}

#[tokio::test]
async fn oversell_is_rejected_and_store_unchanged() {
    let state = common::test_state().await;
    let user = common::operator();

    state
        .movements
        .record(Direction::Entry, movement("REF-1", 70, 1), &user)
        .await
        .unwrap();

    let err = state
        .movements
        .record(Direction::Exit, movement("REF-1", 90, 2), &user)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            available: 70,
            requested: 90,
            ..
        }
    );

    // No movement row and no audit row survived the rollback.
    let (_, total) = state
        .movements
        .list_raw(MovementFilter::default(), 1, 50)
        .await
        .unwrap();
    assert_eq!(total, 1);
    let (_, audit_total) = state.audit.list(AuditFilter::default(), 1, 50).await.unwrap();
    assert_eq!(audit_total, 1);
    assert_eq!(state.metrics.balance("REF-1").await.unwrap(), 70);
}

#[tokio::test]
async fn exit_succeeds_up_to_exact_balance() {
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
    // 60 <= 70, so this passes and drops the balance to 10.
    state
        .movements
        .record(Direction::Exit, movement("REF-1", 60, 3), &user)
        .await
        .unwrap();
    assert_eq!(state.metrics.balance("REF-1").await.unwrap(), 10);

    let err = state
        .movements
        .record(Direction::Exit, movement("REF-1", 60, 4), &user)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            available: 10,
            requested: 60,
            ..
        }
    );
}

#[tokio::test]
async fn every_movement_gets_a_paired_audit_entry() {
    let state = common::test_state().await;
    let user = common::operator();

    let entry = state
        .movements
        .record(Direction::Entry, movement("REF-1", 10, 1), &user)
        .await
        .unwrap();

    let (entries, total) = state
        .audit
        .list(
            AuditFilter {
                entity: Some("movement_record".to_string()),
                entity_id: Some(entry.id.to_string()),
                ..Default::default()
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(entries[0].action, "CREATE");
    assert_eq!(entries[0].user_id, Some(user.id));
}

#[tokio::test]
async fn validation_is_rejected_before_any_write() {
    let state = common::test_state().await;
    let user = common::operator();

    let err = state
        .movements
        .record(Direction::Entry, movement("REF-1", 0, 1), &user)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = state
        .movements
        .record(Direction::Entry, movement("   ", 5, 1), &user)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let (_, audit_total) = state.audit.list(AuditFilter::default(), 1, 10).await.unwrap();
    assert_eq!(audit_total, 0);
}

#[tokio::test]
async fn soft_delete_restore_round_trip_preserves_fields() {
    let state = common::test_state().await;
    let user = common::operator();
    let admin = common::admin();

    let original = state
        .movements
        .record(Direction::Entry, movement("REF-1", 40, 1), &user)
        .await
        .unwrap();

    let deleted = state.movements.soft_delete(original.id, &user).await.unwrap();
    assert!(deleted.soft_deleted_at.is_some());
    assert_eq!(state.metrics.balance("REF-1").await.unwrap(), 0);

    let restored = state.movements.restore(original.id, &admin).await.unwrap();
    assert_eq!(restored, original);
    assert_eq!(state.metrics.balance("REF-1").await.unwrap(), 40);
}

#[tokio::test]
async fn restore_is_admin_only_and_idempotent() {
    let state = common::test_state().await;
    let user = common::operator();
    let admin = common::admin();

    let record = state
        .movements
        .record(Direction::Entry, movement("REF-1", 5, 1), &user)
        .await
        .unwrap();

    let err = state.movements.restore(record.id, &user).await.unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    // Restoring an already-active record is a domain no-op.
    let restored = state.movements.restore(record.id, &admin).await.unwrap();
    assert_eq!(restored, record);

    // The no-op writes no audit entry.
    let (entries, _) = state
        .audit
        .list(
            AuditFilter {
                action: Some("RESTORE".to_string()),
                ..Default::default()
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn deleted_rows_are_hidden_from_default_listing() {
    let state = common::test_state().await;
    let user = common::operator();

    let record = state
        .movements
        .record(Direction::Entry, movement("REF-1", 5, 1), &user)
        .await
        .unwrap();
    state.movements.soft_delete(record.id, &user).await.unwrap();

    let (items, total) = state
        .movements
        .list_raw(MovementFilter::default(), 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 0);
    assert!(items.is_empty());

    let (_, total_with_deleted) = state
        .movements
        .list_raw(
            MovementFilter {
                include_deleted: true,
                ..Default::default()
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(total_with_deleted, 1);
}

#[tokio::test]
async fn soft_delete_of_missing_record_is_not_found() {
    let state = common::test_state().await;
    let user = common::operator();
    let err = state
        .movements
        .soft_delete(uuid::Uuid::new_v4(), &user)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn derived_calendar_fields_follow_iso_rules() {
    let state = common::test_state().await;
    let user = common::operator();

    let record = state
        .movements
        .record(
            Direction::Entry,
            NewMovement {
                material_ref: "REF-ISO".to_string(),
                quantity: 1,
                company: None,
                waybill_ref: None,
                occurred_date: NaiveDate::from_ymd_opt(2024, 12, 30).unwrap(),
                note: None,
            },
            &user,
        )
        .await
        .unwrap();
    // 2024-12-30 belongs to ISO week 1 of 2025.
    assert_eq!(record.week, 1);
    assert_eq!(record.year, 2025);
    assert_eq!(record.month, 12);
}
