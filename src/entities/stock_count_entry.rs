use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of comparing a physical count against the ledger balance.
/// Invariant: `Match` if and only if `difference == 0`.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CountStatus {
    #[strum(serialize = "MATCH")]
    Match,
    #[strum(serialize = "MISMATCH")]
    Mismatch,
}

impl CountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountStatus::Match => "MATCH",
            CountStatus::Mismatch => "MISMATCH",
        }
    }

    pub fn from_difference(difference: i64) -> Self {
        if difference == 0 {
            CountStatus::Match
        } else {
            CountStatus::Mismatch
        }
    }
}

/// One counted material inside a session. Unique per
/// `(session_id, material_ref)`; repeated submissions overwrite.
///
/// `system_qty` is the ledger balance snapshotted at count time and is
/// never recomputed afterwards, so a session report stays stable even as
/// movements continue.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_count_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub session_id: Uuid,
    pub material_ref: String,
    pub counted_qty: i32,
    pub system_qty: i64,
    /// `counted_qty - system_qty`, recomputed on every submission.
    pub difference: i64,
    /// "MATCH" or "MISMATCH"; see [`CountStatus`].
    pub status: String,
    pub note: Option<String>,
    pub counted_at: DateTime<Utc>,
}

impl Model {
    pub fn status(&self) -> Option<CountStatus> {
        self.status.parse().ok()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tracks_difference() {
        assert_eq!(CountStatus::from_difference(0), CountStatus::Match);
        assert_eq!(CountStatus::from_difference(-3), CountStatus::Mismatch);
        assert_eq!(CountStatus::from_difference(12), CountStatus::Mismatch);
    }
}
