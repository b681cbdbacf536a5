//! Transactional Write Gateway: the only path that mutates the ledger.
//!
//! Every operation here commits the business row and its audit entry in
//! one transaction, or neither. Exits recompute the material's balance
//! inside that same transaction and reject oversells with
//! [`ServiceError::InsufficientStock`].
//!
//! The balance-check-then-insert sequence is a check-then-act race under
//! concurrency. On Postgres the exit transaction runs at SERIALIZABLE
//! isolation and retries a bounded number of times on serialization
//! failures (SQLSTATE 40001). SQLite serializes writers with its
//! single-writer lock, so a plain transaction is sufficient there.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, DbErr, EntityTrait, IsolationLevel,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::calendar;
use crate::db::DbPool;
use crate::entities::audit_entry::actions;
use crate::entities::movement_record::{self, normalize_ref, Direction, Entity as MovementRecord};
use crate::errors::ServiceError;
use crate::services::audit;
use crate::services::metrics::balance_of;

const ENTITY: &str = "movement_record";
const MAX_EXIT_ATTEMPTS: u32 = 3;

/// Input for one movement, metadata included. Quantity must be positive;
/// the reference is normalized before anything touches the database.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub material_ref: String,
    pub quantity: i32,
    pub company: Option<String>,
    pub waybill_ref: Option<String>,
    pub occurred_date: NaiveDate,
    pub note: Option<String>,
}

/// Filters for the raw chronological listing.
#[derive(Debug, Default, Clone)]
pub struct MovementFilter {
    pub material_ref: Option<String>,
    pub company: Option<String>,
    pub direction: Option<Direction>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Admin-only; default listings never show soft-deleted rows.
    pub include_deleted: bool,
}

pub struct MovementService {
    db: Arc<DbPool>,
}

impl MovementService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Records a movement in either direction. Entries always succeed;
    /// exits are balance-guarded.
    #[instrument(skip(self, input, actor), fields(material_ref = %input.material_ref, quantity = input.quantity))]
    pub async fn record(
        &self,
        direction: Direction,
        input: NewMovement,
        actor: &CurrentUser,
    ) -> Result<movement_record::Model, ServiceError> {
        // Reject malformed input before any transaction opens.
        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be a positive integer".into(),
            ));
        }
        let key = normalize_ref(&input.material_ref);
        if key.is_empty() {
            return Err(ServiceError::ValidationError(
                "material reference must not be empty".into(),
            ));
        }

        let record = match direction {
            Direction::Entry => self.insert_entry(key, input, actor.id).await?,
            Direction::Exit => self.insert_exit(key, input, actor.id).await?,
        };
        counter!("stockledger_movements_recorded", 1, "direction" => direction.as_str());
        info!(id = %record.id, direction = direction.as_str(), "movement recorded");
        Ok(record)
    }

    async fn insert_entry(
        &self,
        key: String,
        input: NewMovement,
        actor_id: Uuid,
    ) -> Result<movement_record::Model, ServiceError> {
        self.db
            .transaction::<_, movement_record::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let row = build_row(&key, Direction::Entry, &input, actor_id);
                    let record = row.insert(txn).await?;
                    audit::record(
                        txn,
                        Some(actor_id),
                        actions::CREATE,
                        ENTITY,
                        &record.id.to_string(),
                        movement_details(&record),
                    )
                    .await?;
                    Ok(record)
                })
            })
            .await
            .map_err(unwrap_txn_err)
    }

    async fn insert_exit(
        &self,
        key: String,
        input: NewMovement,
        actor_id: Uuid,
    ) -> Result<movement_record::Model, ServiceError> {
        let serializable = self.db.get_database_backend() == DbBackend::Postgres;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let key = key.clone();
            let input = input.clone();
            let result = if serializable {
                self.db
                    .transaction_with_config::<_, movement_record::Model, ServiceError>(
                        move |txn| Box::pin(exit_txn(txn, key, input, actor_id)),
                        Some(IsolationLevel::Serializable),
                        None,
                    )
                    .await
            } else {
                self.db
                    .transaction::<_, movement_record::Model, ServiceError>(move |txn| {
                        Box::pin(exit_txn(txn, key, input, actor_id))
                    })
                    .await
            };

            match result {
                Ok(record) => return Ok(record),
                Err(e) => {
                    let err = unwrap_txn_err(e);
                    let retryable = matches!(
                        &err,
                        ServiceError::DatabaseError(db_err) if is_serialization_failure(db_err)
                    );
                    if retryable && attempt < MAX_EXIT_ATTEMPTS {
                        warn!(attempt, "exit transaction serialization conflict, retrying");
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Marks a record inactive. Already-deleted records are left as-is.
    #[instrument(skip(self, actor))]
    pub async fn soft_delete(
        &self,
        id: Uuid,
        actor: &CurrentUser,
    ) -> Result<movement_record::Model, ServiceError> {
        let actor_id = actor.id;
        self.db
            .transaction::<_, movement_record::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let record = MovementRecord::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("movement {}", id)))?;
                    if record.soft_deleted_at.is_some() {
                        return Ok(record);
                    }
                    let mut active: movement_record::ActiveModel = record.into();
                    active.soft_deleted_at = Set(Some(Utc::now()));
                    let updated = active.update(txn).await?;
                    audit::record(
                        txn,
                        Some(actor_id),
                        actions::DELETE_SOFT,
                        ENTITY,
                        &id.to_string(),
                        movement_details(&updated),
                    )
                    .await?;
                    Ok(updated)
                })
            })
            .await
            .map_err(unwrap_txn_err)
    }

    /// Clears the soft-delete marker. Admin-only; restoring an
    /// already-active record is a domain no-op.
    #[instrument(skip(self, actor))]
    pub async fn restore(
        &self,
        id: Uuid,
        actor: &CurrentUser,
    ) -> Result<movement_record::Model, ServiceError> {
        if !actor.role.is_admin() {
            return Err(ServiceError::Forbidden(
                "only administrators may restore movements".into(),
            ));
        }
        let actor_id = actor.id;
        self.db
            .transaction::<_, movement_record::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let record = MovementRecord::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("movement {}", id)))?;
                    if record.soft_deleted_at.is_none() {
                        return Ok(record);
                    }
                    let mut active: movement_record::ActiveModel = record.into();
                    active.soft_deleted_at = Set(None);
                    let updated = active.update(txn).await?;
                    audit::record(
                        txn,
                        Some(actor_id),
                        actions::RESTORE,
                        ENTITY,
                        &id.to_string(),
                        movement_details(&updated),
                    )
                    .await?;
                    Ok(updated)
                })
            })
            .await
            .map_err(unwrap_txn_err)
    }

    /// Fetches one record regardless of its soft-delete state.
    pub async fn get(&self, id: Uuid) -> Result<movement_record::Model, ServiceError> {
        MovementRecord::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("movement {}", id)))
    }

    /// Raw chronological listing, newest first.
    pub async fn list_raw(
        &self,
        filter: MovementFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<movement_record::Model>, u64), ServiceError> {
        let mut query = MovementRecord::find()
            .order_by_desc(movement_record::Column::OccurredDate)
            .order_by_desc(movement_record::Column::CreatedAt);
        if !filter.include_deleted {
            query = query.filter(movement_record::Column::SoftDeletedAt.is_null());
        }
        if let Some(material_ref) = filter.material_ref.as_deref() {
            query = query.filter(movement_record::Column::MaterialRef.eq(normalize_ref(material_ref)));
        }
        if let Some(company) = filter.company {
            query = query.filter(movement_record::Column::Company.contains(&company));
        }
        if let Some(direction) = filter.direction {
            query = query.filter(movement_record::Column::Direction.eq(direction.as_str()));
        }
        if let Some(from) = filter.date_from {
            query = query.filter(movement_record::Column::OccurredDate.gte(from));
        }
        if let Some(to) = filter.date_to {
            query = query.filter(movement_record::Column::OccurredDate.lte(to));
        }

        let paginator = query.paginate(self.db.as_ref(), limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }
}

/// Body of the exit transaction: balance check and insert on the same
/// transactional view, audit row included.
async fn exit_txn(
    txn: &sea_orm::DatabaseTransaction,
    key: String,
    input: NewMovement,
    actor_id: Uuid,
) -> Result<movement_record::Model, ServiceError> {
    let history = MovementRecord::find()
        .filter(movement_record::Column::MaterialRef.eq(key.clone()))
        .filter(movement_record::Column::SoftDeletedAt.is_null())
        .all(txn)
        .await?;
    let available = balance_of(&history);
    let requested = i64::from(input.quantity);
    if requested > available {
        counter!("stockledger_exits_rejected", 1);
        return Err(ServiceError::InsufficientStock {
            material_ref: key,
            available,
            requested,
        });
    }
    let row = build_row(&key, Direction::Exit, &input, actor_id);
    let record = row.insert(txn).await?;
    audit::record(
        txn,
        Some(actor_id),
        actions::CREATE,
        ENTITY,
        &record.id.to_string(),
        movement_details(&record),
    )
    .await?;
    Ok(record)
}

fn build_row(
    key: &str,
    direction: Direction,
    input: &NewMovement,
    actor_id: Uuid,
) -> movement_record::ActiveModel {
    let fields = calendar::derive(input.occurred_date);
    movement_record::ActiveModel {
        id: Set(Uuid::new_v4()),
        material_ref: Set(key.to_string()),
        direction: Set(direction.as_str().to_string()),
        quantity: Set(input.quantity),
        company: Set(input.company.clone()),
        waybill_ref: Set(input.waybill_ref.clone()),
        occurred_date: Set(input.occurred_date),
        year: Set(fields.year),
        month: Set(fields.month),
        week: Set(fields.week),
        note: Set(input.note.clone()),
        modified_by: Set(Some(actor_id)),
        soft_deleted_at: Set(None),
        created_at: Set(Utc::now()),
    }
}

fn movement_details(record: &movement_record::Model) -> serde_json::Value {
    json!({
        "material_ref": record.material_ref,
        "direction": record.direction,
        "quantity": record.quantity,
        "occurred_date": record.occurred_date,
        "company": record.company,
        "waybill_ref": record.waybill_ref,
    })
}

fn unwrap_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

/// Postgres reports serialization conflicts as SQLSTATE 40001.
fn is_serialization_failure(e: &DbErr) -> bool {
    let msg = e.to_string();
    msg.contains("40001") || msg.contains("could not serialize access")
}
