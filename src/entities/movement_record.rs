use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a stock movement. Stored as a lowercase string column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    utoipa::ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entry => "entry",
            Direction::Exit => "exit",
        }
    }
}

/// One immutable stock movement fact. The ground truth of the ledger.
///
/// `quantity`, `direction` and `material_ref` never change after insert;
/// corrections are recorded as counter-movements. Only `soft_deleted_at`
/// may be set or cleared, and rows carrying it are excluded from every
/// balance and default listing.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, utoipa::ToSchema)]
#[sea_orm(table_name = "movement_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Normalized (trimmed, uppercased) material reference.
    pub material_ref: String,
    /// "entry" or "exit"; see [`Direction`].
    pub direction: String,
    pub quantity: i32,
    pub company: Option<String>,
    pub waybill_ref: Option<String>,
    /// Calendar date of the physical movement in the business timezone.
    pub occurred_date: NaiveDate,
    /// ISO week-year of `occurred_date`, fixed at insert.
    pub year: i32,
    /// Calendar month of `occurred_date`, fixed at insert.
    pub month: i32,
    /// ISO week of `occurred_date`, fixed at insert.
    pub week: i32,
    pub note: Option<String>,
    /// Recording user; `None` means the system itself.
    pub modified_by: Option<Uuid>,
    pub soft_deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn direction(&self) -> Option<Direction> {
        self.direction.parse().ok()
    }

    pub fn is_active(&self) -> bool {
        self.soft_deleted_at.is_none()
    }

    /// Signed contribution of this record to its material's balance.
    pub fn signed_quantity(&self) -> i64 {
        match self.direction() {
            Some(Direction::Entry) => i64::from(self.quantity),
            Some(Direction::Exit) => -i64::from(self.quantity),
            None => 0,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Normalizes a material reference to its canonical ledger key.
/// References are matched case-insensitively across the whole system.
pub fn normalize_ref(raw: &str) -> String {
    raw.trim().to_uppercase()
}
