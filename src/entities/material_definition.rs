use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Threshold applied when a material has no definition row.
pub const DEFAULT_MIN_STOCK: i32 = 20;

/// Optional per-reference metadata, owned by the administrative editing
/// surface. The ledger only reads it; materials with movements but no
/// definition are synthesized at read time with defaults and never block
/// a write.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "material_definitions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub reference: String,
    pub min_stock: i32,
    pub abc_class: Option<String>,
    pub default_location: Option<String>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
