use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a stock-count session. A session is opened for one
/// `(creator, calendar day)` pair and is never reopened after completion.
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
pub enum SessionStatus {
    #[strum(serialize = "IN_PROGRESS")]
    InProgress,
    #[strum(serialize = "COMPLETED")]
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Completed => "COMPLETED",
        }
    }
}

/// One bounded period of physical counting against ledger balances.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_count_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Business calendar day the session belongs to.
    pub session_date: NaiveDate,
    pub created_by: Uuid,
    /// "IN_PROGRESS" or "COMPLETED"; see [`SessionStatus`].
    pub status: String,
    /// JSON array of calendar days on which counts were submitted.
    pub work_days: Json,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn status(&self) -> Option<SessionStatus> {
        self.status.parse().ok()
    }

    pub fn work_days(&self) -> Vec<NaiveDate> {
        serde_json::from_value(self.work_days.clone()).unwrap_or_default()
    }

    /// Display-only derived state: a past-dated session that was never
    /// closed is "incomplete". Not stored, purely a date comparison.
    pub fn is_incomplete(&self, today: NaiveDate) -> bool {
        self.session_date < today && self.status() != Some(SessionStatus::Completed)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
