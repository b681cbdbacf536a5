//! Property checks for the aggregation fold. The ledger never stores a
//! running balance, so the fold must equal the signed sum of live rows
//! under any history shape.

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use stockledger_api::entities::movement_record::{self, Direction};
use stockledger_api::services::metrics::{balance_of, fold_materials};

#[derive(Debug, Clone)]
struct GenMovement {
    material: u8,
    entry: bool,
    quantity: i32,
    day_offset: u16,
    deleted: bool,
}

fn arb_movement() -> impl Strategy<Value = GenMovement> {
    (any::<u8>(), any::<bool>(), 1..10_000i32, 0..700u16, any::<bool>()).prop_map(
        |(material, entry, quantity, day_offset, deleted)| GenMovement {
            material: material % 5,
            entry,
            quantity,
            day_offset,
            deleted,
        },
    )
}

fn materialize(history: &[GenMovement]) -> Vec<movement_record::Model> {
    let base = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    history
        .iter()
        .enumerate()
        .map(|(seq, m)| {
            let occurred = base + chrono::Days::new(u64::from(m.day_offset));
            let fields = stockledger_api::calendar::derive(occurred);
            movement_record::Model {
                id: Uuid::new_v4(),
                material_ref: format!("REF-{}", m.material),
                direction: if m.entry {
                    Direction::Entry.as_str().to_string()
                } else {
                    Direction::Exit.as_str().to_string()
                },
                quantity: m.quantity,
                company: None,
                waybill_ref: None,
                occurred_date: occurred,
                year: fields.year,
                month: fields.month,
                week: fields.week,
                note: None,
                modified_by: None,
                soft_deleted_at: m
                    .deleted
                    .then(|| Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                created_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, seq as u32 % 60).unwrap(),
            }
        })
        .collect()
}

proptest! {
    /// Folded balance equals the signed sum over live rows, per material.
    #[test]
    fn fold_matches_signed_sum(history in proptest::collection::vec(arb_movement(), 0..80)) {
        let records = materialize(&history);
        let aggregates = fold_materials(&records);

        for material in 0u8..5 {
            let key = format!("REF-{}", material);
            let expected: i64 = records
                .iter()
                .filter(|r| r.material_ref == key && r.soft_deleted_at.is_none())
                .map(|r| r.signed_quantity())
                .sum();
            let folded = aggregates.get(&key).map(|a| a.balance_raw()).unwrap_or(0);
            prop_assert_eq!(folded, expected);

            let per_ref: Vec<_> = records
                .iter()
                .filter(|r| r.material_ref == key)
                .cloned()
                .collect();
            prop_assert_eq!(balance_of(&per_ref), expected);
        }
    }

    /// A delete-then-restore cycle leaves every aggregate untouched.
    #[test]
    fn delete_restore_cycle_is_identity(history in proptest::collection::vec(arb_movement(), 1..60)) {
        let records = materialize(&history);
        let before = fold_materials(&records);

        let mut cycled = records.clone();
        for record in cycled.iter_mut() {
            record.soft_deleted_at = Some(Utc::now());
        }
        for (record, original) in cycled.iter_mut().zip(records.iter()) {
            record.soft_deleted_at = original.soft_deleted_at;
        }
        let after = fold_materials(&cycled);

        prop_assert_eq!(before.len(), after.len());
        for (key, agg) in &before {
            let other = &after[key];
            prop_assert_eq!(agg.balance_raw(), other.balance_raw());
            prop_assert_eq!(agg.movement_count, other.movement_count);
        }
    }

    /// Display balances never go negative and movement counts only count
    /// live rows.
    #[test]
    fn display_balance_is_clamped(history in proptest::collection::vec(arb_movement(), 0..80)) {
        let records = materialize(&history);
        let live = records.iter().filter(|r| r.soft_deleted_at.is_none()).count() as u64;
        let aggregates = fold_materials(&records);
        let counted: u64 = aggregates.values().map(|a| a.movement_count).sum();
        prop_assert_eq!(counted, live);
        for agg in aggregates.values() {
            prop_assert!(agg.balance() >= 0);
        }
    }
}
