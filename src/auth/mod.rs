//! Identity and permission checks.
//!
//! Identity management lives outside this core: an upstream gateway
//! authenticates the caller and forwards `X-User-Id` / `X-User-Role`
//! headers. This module only extracts that identity and answers
//! `has_permission(role, action)` against a live-editable table with a
//! short read-through cache.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use dashmap::DashMap;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionError,
    TransactionTrait,
};
use serde_json::json;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::audit_entry::actions as audit_actions;
use crate::entities::role_permission::{self, Entity as RolePermission};
use crate::errors::ServiceError;
use crate::services::audit;

/// Fixed catalog of permission actions known to the core.
pub mod actions {
    pub const INVENTORY_VIEW: &str = "inventory.view";
    pub const INVENTORY_CREATE: &str = "inventory.create";
    pub const INVENTORY_DELETE: &str = "inventory.delete";
    pub const INVENTORY_RESTORE: &str = "inventory.restore";
    pub const REPORTS_VIEW: &str = "reports.view";
    pub const STOCKCOUNT_MANAGE: &str = "stockcount.manage";
    pub const AUDIT_VIEW: &str = "audit.view";
    pub const PERMISSIONS_MANAGE: &str = "permissions.manage";

    pub const ALL: &[&str] = &[
        INVENTORY_VIEW,
        INVENTORY_CREATE,
        INVENTORY_DELETE,
        INVENTORY_RESTORE,
        REPORTS_VIEW,
        STOCKCOUNT_MANAGE,
        AUDIT_VIEW,
        PERMISSIONS_MANAGE,
    ];
}

/// Role name as forwarded by the identity collaborator. Matched
/// case-insensitively; ADMIN is granted every action unconditionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Role(name.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.0 == "ADMIN"
    }
}

/// Authenticated caller identity, extracted from gateway headers.
/// Absent or malformed headers refuse the operation.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing or invalid X-User-Id".into()))?;
        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .map(Role::new)
            .ok_or_else(|| ServiceError::Unauthorized("missing X-User-Role".into()))?;
        Ok(CurrentUser { id, role })
    }
}

struct CachedRole {
    actions: HashSet<String>,
    fetched_at: Instant,
}

/// Table-driven permission checks with a bounded-TTL read cache.
///
/// Reads may serve entries up to `ttl` old; writes (`grant`/`revoke`)
/// invalidate the affected role synchronously, so permission edits take
/// effect on the next request.
pub struct PermissionService {
    db: Arc<DbPool>,
    cache: DashMap<String, CachedRole>,
    ttl: Duration,
}

impl PermissionService {
    pub fn new(db: Arc<DbPool>, ttl: Duration) -> Self {
        Self {
            db,
            cache: DashMap::new(),
            ttl,
        }
    }

    pub async fn has_permission(&self, role: &Role, action: &str) -> Result<bool, ServiceError> {
        if role.is_admin() {
            return Ok(true);
        }
        if let Some(entry) = self.cache.get(role.as_str()) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.actions.contains(action));
            }
        }
        let actions = self.load_role(role).await?;
        let granted = actions.contains(action);
        self.cache.insert(
            role.as_str().to_string(),
            CachedRole {
                actions,
                fetched_at: Instant::now(),
            },
        );
        Ok(granted)
    }

    /// Permission gate used by handlers. Refusals stay generic toward the
    /// caller; the denied action is only logged.
    pub async fn require(&self, user: &CurrentUser, action: &str) -> Result<(), ServiceError> {
        if self.has_permission(&user.role, action).await? {
            Ok(())
        } else {
            tracing::warn!(user_id = %user.id, role = %user.role.as_str(), action, "permission denied");
            Err(ServiceError::Forbidden(format!(
                "role {} lacks {}",
                user.role.as_str(),
                action
            )))
        }
    }

    /// Grants an action to a role. Granting an already-granted pair is a
    /// no-op and leaves no audit trace.
    pub async fn grant(
        &self,
        actor_id: Option<Uuid>,
        role: &Role,
        action: &str,
    ) -> Result<(), ServiceError> {
        let role_name = role.as_str().to_string();
        let action = action.to_string();
        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let existing = RolePermission::find()
                        .filter(role_permission::Column::Role.eq(role_name.as_str()))
                        .filter(role_permission::Column::Action.eq(action.as_str()))
                        .one(txn)
                        .await?;
                    if existing.is_some() {
                        return Ok(());
                    }
                    role_permission::ActiveModel {
                        role: Set(role_name.clone()),
                        action: Set(action.clone()),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;
                    audit::record(
                        txn,
                        actor_id,
                        audit_actions::PERMISSION_GRANT,
                        "role_permission",
                        &role_name,
                        json!({ "role": role_name, "action": action }),
                    )
                    .await?;
                    Ok(())
                })
            })
            .await
            .map_err(unwrap_txn_err)?;
        self.invalidate(role);
        Ok(())
    }

    /// Revokes an action from a role. Revoking an absent pair is a no-op.
    pub async fn revoke(
        &self,
        actor_id: Option<Uuid>,
        role: &Role,
        action: &str,
    ) -> Result<(), ServiceError> {
        let role_name = role.as_str().to_string();
        let action = action.to_string();
        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let deleted = RolePermission::delete_many()
                        .filter(role_permission::Column::Role.eq(role_name.as_str()))
                        .filter(role_permission::Column::Action.eq(action.as_str()))
                        .exec(txn)
                        .await?;
                    if deleted.rows_affected == 0 {
                        return Ok(());
                    }
                    audit::record(
                        txn,
                        actor_id,
                        audit_actions::PERMISSION_REVOKE,
                        "role_permission",
                        &role_name,
                        json!({ "role": role_name, "action": action }),
                    )
                    .await?;
                    Ok(())
                })
            })
            .await
            .map_err(unwrap_txn_err)?;
        self.invalidate(role);
        Ok(())
    }

    /// Drops the cached action set for a role. Called synchronously from
    /// every permission write.
    pub fn invalidate(&self, role: &Role) {
        self.cache.remove(role.as_str());
    }

    async fn load_role(&self, role: &Role) -> Result<HashSet<String>, ServiceError> {
        let rows = RolePermission::find()
            .filter(role_permission::Column::Role.eq(role.as_str()))
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(|r| r.action).collect())
    }
}

fn unwrap_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_normalize() {
        assert!(Role::new(" admin ").is_admin());
        assert!(Role::new("Admin").is_admin());
        assert!(!Role::new("operator").is_admin());
        assert_eq!(Role::new("clerk").as_str(), "CLERK");
    }

    #[test]
    fn action_catalog_is_dot_scoped() {
        for action in actions::ALL {
            assert!(action.contains('.'), "malformed action {}", action);
        }
    }
}
