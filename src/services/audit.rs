//! Audit trail: append-only, written atomically with its mutation.
//!
//! [`record`] takes any `ConnectionTrait`, so gateway and workflow code
//! call it on the transaction handle of the business write. A failed
//! audit insert therefore rolls the business mutation back with it; the
//! system never holds one without the other.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::audit_entry::{self, Entity as AuditEntry};
use crate::errors::ServiceError;

/// Inserts one audit row on the given connection (normally a transaction).
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    user_id: Option<Uuid>,
    action: &str,
    entity: &str,
    entity_id: &str,
    details: serde_json::Value,
) -> Result<audit_entry::Model, ServiceError> {
    let row = audit_entry::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        action: Set(action.to_string()),
        entity: Set(entity.to_string()),
        entity_id: Set(entity_id.to_string()),
        details: Set(Some(details)),
        created_at: Set(Utc::now()),
    };
    Ok(row.insert(conn).await?)
}

/// Filters accepted by the audit listing.
#[derive(Debug, Default, Clone)]
pub struct AuditFilter {
    pub entity: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<String>,
    pub user_id: Option<Uuid>,
}

/// Read side of the trail, admin-gated at the handler.
pub struct AuditService {
    db: Arc<DbPool>,
}

impl AuditService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Lists audit entries newest first.
    pub async fn list(
        &self,
        filter: AuditFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<audit_entry::Model>, u64), ServiceError> {
        let mut query = AuditEntry::find().order_by_desc(audit_entry::Column::CreatedAt);
        if let Some(entity) = filter.entity {
            query = query.filter(audit_entry::Column::Entity.eq(entity));
        }
        if let Some(entity_id) = filter.entity_id {
            query = query.filter(audit_entry::Column::EntityId.eq(entity_id));
        }
        if let Some(action) = filter.action {
            query = query.filter(audit_entry::Column::Action.eq(action));
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(audit_entry::Column::UserId.eq(user_id));
        }

        let paginator = query.paginate(self.db.as_ref(), limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }
}
