use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit actions emitted by the core. Free-form strings in storage; these
/// constants cover every mutation path the engine owns.
pub mod actions {
    pub const CREATE: &str = "CREATE";
    pub const DELETE_SOFT: &str = "DELETE_SOFT";
    pub const RESTORE: &str = "RESTORE";
    pub const COUNT_SUBMIT: &str = "COUNT_SUBMIT";
    pub const SESSION_OPEN: &str = "SESSION_OPEN";
    pub const SESSION_CLOSE: &str = "SESSION_CLOSE";
    pub const PERMISSION_GRANT: &str = "PERMISSION_GRANT";
    pub const PERMISSION_REVOKE: &str = "PERMISSION_REVOKE";
}

/// Write-once audit fact, inserted in the same transaction as the
/// mutation it describes. Never updated, never deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Acting user; `None` means the system itself.
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    /// Serialized key facts of the mutation (quantities, references).
    pub details: Option<Json>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
