//! Stock-count reconciliation workflow.
//!
//! A session is one bounded period of physical counting for one
//! `(creator, business day)`. Counts are upserted per material with the
//! ledger balance snapshotted at submit time; a session report therefore
//! stays stable even while movements continue. Sessions close explicitly
//! and never reopen.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::calendar;
use crate::db::DbPool;
use crate::entities::audit_entry::actions;
use crate::entities::movement_record::{self, normalize_ref, Entity as MovementRecord};
use crate::entities::stock_count_entry::{self, CountStatus, Entity as StockCountEntry};
use crate::entities::stock_count_session::{self, Entity as StockCountSession, SessionStatus};
use crate::errors::ServiceError;
use crate::services::audit;
use crate::services::metrics::balance_of;

const SESSION_ENTITY: &str = "stock_count_session";
const ENTRY_ENTITY: &str = "stock_count_entry";

/// One submitted count.
#[derive(Debug, Clone)]
pub struct NewCount {
    pub material_ref: String,
    pub counted_quantity: i32,
    pub note: Option<String>,
}

pub struct StockCountService {
    db: Arc<DbPool>,
    business_tz_offset_minutes: i32,
}

impl StockCountService {
    pub fn new(db: Arc<DbPool>, business_tz_offset_minutes: i32) -> Self {
        Self {
            db,
            business_tz_offset_minutes,
        }
    }

    fn today(&self) -> NaiveDate {
        calendar::business_today(self.business_tz_offset_minutes, Utc::now())
    }

    /// Opens a session for the given business day (default: today), or
    /// returns the caller's existing session for that day.
    #[instrument(skip(self, actor))]
    pub async fn open_session(
        &self,
        actor: &CurrentUser,
        date: Option<NaiveDate>,
    ) -> Result<stock_count_session::Model, ServiceError> {
        let session_date = date.unwrap_or_else(|| self.today());
        if let Some(existing) = self.find_session(actor.id, session_date).await? {
            return Ok(existing);
        }
        let actor_id = actor.id;
        let inserted = self
            .db
            .transaction::<_, stock_count_session::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let row = stock_count_session::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        session_date: Set(session_date),
                        created_by: Set(actor_id),
                        status: Set(SessionStatus::InProgress.as_str().to_string()),
                        work_days: Set(json!([])),
                        created_at: Set(Utc::now()),
                    };
                    let session = row.insert(txn).await?;
                    audit::record(
                        txn,
                        Some(actor_id),
                        actions::SESSION_OPEN,
                        SESSION_ENTITY,
                        &session.id.to_string(),
                        json!({ "session_date": session.session_date }),
                    )
                    .await?;
                    Ok(session)
                })
            })
            .await
            .map_err(unwrap_txn_err);
        match inserted {
            Ok(session) => {
                info!(id = %session.id, %session_date, "stock-count session opened");
                Ok(session)
            }
            // Lost a race with a concurrent open for the same (user, day):
            // the unique index fired, so the winner's row is the session.
            Err(ServiceError::DatabaseError(e)) if is_unique_violation(&e) => self
                .find_session(actor.id, session_date)
                .await?
                .ok_or(ServiceError::DatabaseError(e)),
            Err(e) => Err(e),
        }
    }

    /// Looks up the caller's session for a day; `None` when no counting
    /// happened (or was started) on that day.
    pub async fn find_session(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<stock_count_session::Model>, ServiceError> {
        Ok(StockCountSession::find()
            .filter(stock_count_session::Column::CreatedBy.eq(user_id))
            .filter(stock_count_session::Column::SessionDate.eq(date))
            .one(self.db.as_ref())
            .await?)
    }

    /// Upserts a count for `(session, material)`. Repeated submissions
    /// overwrite: quantity, snapshot, difference, status and note all
    /// take the latest values. The session's work-day set gains the
    /// current business day, idempotently.
    #[instrument(skip(self, actor, count), fields(material_ref = %count.material_ref))]
    pub async fn submit_count(
        &self,
        actor: &CurrentUser,
        session_id: Uuid,
        count: NewCount,
    ) -> Result<stock_count_entry::Model, ServiceError> {
        if count.counted_quantity < 0 {
            return Err(ServiceError::ValidationError(
                "counted quantity must not be negative".into(),
            ));
        }
        let key = normalize_ref(&count.material_ref);
        if key.is_empty() {
            return Err(ServiceError::ValidationError(
                "material reference must not be empty".into(),
            ));
        }
        let actor_id = actor.id;
        let today = self.today();
        self.db
            .transaction::<_, stock_count_entry::Model, ServiceError>(move |txn| {
                Box::pin(submit_txn(txn, actor_id, session_id, key, count, today))
            })
            .await
            .map_err(unwrap_txn_err)
    }

    /// Completes a session. Closing an already-completed session is a
    /// domain no-op; afterwards the session is a read-only report.
    #[instrument(skip(self, actor))]
    pub async fn close_session(
        &self,
        actor: &CurrentUser,
        session_id: Uuid,
    ) -> Result<stock_count_session::Model, ServiceError> {
        let actor_id = actor.id;
        let is_admin = actor.role.is_admin();
        self.db
            .transaction::<_, stock_count_session::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let session = find_session_txn(txn, session_id).await?;
                    if session.created_by != actor_id && !is_admin {
                        return Err(ServiceError::Forbidden(
                            "session belongs to another user".into(),
                        ));
                    }
                    if session.status() == Some(SessionStatus::Completed) {
                        return Ok(session);
                    }
                    let mut active: stock_count_session::ActiveModel = session.into();
                    active.status = Set(SessionStatus::Completed.as_str().to_string());
                    let updated = active.update(txn).await?;
                    audit::record(
                        txn,
                        Some(actor_id),
                        actions::SESSION_CLOSE,
                        SESSION_ENTITY,
                        &session_id.to_string(),
                        json!({ "session_date": updated.session_date }),
                    )
                    .await?;
                    Ok(updated)
                })
            })
            .await
            .map_err(unwrap_txn_err)
    }

    /// Session plus its entries, for the comparison report.
    pub async fn session_report(
        &self,
        actor: &CurrentUser,
        session_id: Uuid,
    ) -> Result<(stock_count_session::Model, Vec<stock_count_entry::Model>), ServiceError> {
        let session = StockCountSession::find_by_id(session_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("session {}", session_id)))?;
        if session.created_by != actor.id && !actor.role.is_admin() {
            return Err(ServiceError::Forbidden(
                "session belongs to another user".into(),
            ));
        }
        let entries = StockCountEntry::find()
            .filter(stock_count_entry::Column::SessionId.eq(session_id))
            .order_by_asc(stock_count_entry::Column::MaterialRef)
            .all(self.db.as_ref())
            .await?;
        Ok((session, entries))
    }

    /// Session history, newest first. Admins see every user's sessions.
    pub async fn list_history(
        &self,
        actor: &CurrentUser,
    ) -> Result<Vec<stock_count_session::Model>, ServiceError> {
        let mut query =
            StockCountSession::find().order_by_desc(stock_count_session::Column::SessionDate);
        if !actor.role.is_admin() {
            query = query.filter(stock_count_session::Column::CreatedBy.eq(actor.id));
        }
        Ok(query.all(self.db.as_ref()).await?)
    }

    /// Business "today", exposed for the derived incomplete state.
    pub fn business_today(&self) -> NaiveDate {
        self.today()
    }
}

async fn find_session_txn(
    txn: &DatabaseTransaction,
    session_id: Uuid,
) -> Result<stock_count_session::Model, ServiceError> {
    StockCountSession::find_by_id(session_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session {}", session_id)))
}

async fn submit_txn(
    txn: &DatabaseTransaction,
    actor_id: Uuid,
    session_id: Uuid,
    key: String,
    count: NewCount,
    today: NaiveDate,
) -> Result<stock_count_entry::Model, ServiceError> {
    let session = find_session_txn(txn, session_id).await?;
    // Cross-user writes are rejected even for the same calendar day.
    if session.created_by != actor_id {
        return Err(ServiceError::Forbidden(
            "session belongs to another user".into(),
        ));
    }
    if session.status() != Some(SessionStatus::InProgress) {
        return Err(ServiceError::Conflict(
            "session is completed and read-only".into(),
        ));
    }

    // Snapshot of the ledger balance at count time; never recomputed.
    let history = MovementRecord::find()
        .filter(movement_record::Column::MaterialRef.eq(key.clone()))
        .filter(movement_record::Column::SoftDeletedAt.is_null())
        .all(txn)
        .await?;
    let system_qty = balance_of(&history).max(0);
    let difference = i64::from(count.counted_quantity) - system_qty;
    let status = CountStatus::from_difference(difference);
    let counted_at = Utc::now();

    let existing = StockCountEntry::find()
        .filter(stock_count_entry::Column::SessionId.eq(session_id))
        .filter(stock_count_entry::Column::MaterialRef.eq(key.clone()))
        .one(txn)
        .await?;
    let entry = match existing {
        Some(entry) => {
            let mut active: stock_count_entry::ActiveModel = entry.into();
            active.counted_qty = Set(count.counted_quantity);
            active.system_qty = Set(system_qty);
            active.difference = Set(difference);
            active.status = Set(status.as_str().to_string());
            active.note = Set(count.note.clone());
            active.counted_at = Set(counted_at);
            active.update(txn).await?
        }
        None => {
            stock_count_entry::ActiveModel {
                id: Set(Uuid::new_v4()),
                session_id: Set(session_id),
                material_ref: Set(key.clone()),
                counted_qty: Set(count.counted_quantity),
                system_qty: Set(system_qty),
                difference: Set(difference),
                status: Set(status.as_str().to_string()),
                note: Set(count.note.clone()),
                counted_at: Set(counted_at),
            }
            .insert(txn)
            .await?
        }
    };

    // Work-day set gains today at most once.
    let mut work_days = session.work_days();
    if !work_days.contains(&today) {
        work_days.push(today);
        work_days.sort();
        let mut active: stock_count_session::ActiveModel = session.into();
        active.work_days = Set(serde_json::to_value(&work_days)?);
        active.update(txn).await?;
    }

    audit::record(
        txn,
        Some(actor_id),
        actions::COUNT_SUBMIT,
        ENTRY_ENTITY,
        &entry.id.to_string(),
        json!({
            "session_id": session_id,
            "material_ref": key,
            "counted_qty": entry.counted_qty,
            "system_qty": entry.system_qty,
            "difference": entry.difference,
            "status": entry.status,
        }),
    )
    .await?;
    Ok(entry)
}

/// SQLite reports "UNIQUE constraint failed"; Postgres raises SQLSTATE
/// 23505 ("duplicate key value violates unique constraint").
fn is_unique_violation(e: &DbErr) -> bool {
    let msg = e.to_string();
    msg.contains("UNIQUE constraint") || msg.contains("23505") || msg.contains("duplicate key")
}

fn unwrap_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}
