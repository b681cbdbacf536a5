use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One granted `(role, action)` pair. The table is live-editable; the
/// permission cache is invalidated synchronously on every write.
/// ADMIN is granted everything implicitly and never stored here.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "role_permissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub role: String,
    pub action: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
