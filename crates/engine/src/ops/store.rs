//! Record store and audit log primitives. Callers own the DB transaction.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::{
    ActiveValue, Condition, ConnectionTrait, QueryFilter, QueryOrder, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    AuditAction, AuditEntry, ChangeSet, EngineError, Expense, ResultEngine, audit, expenses,
};

pub(super) async fn load_expense<C>(db: &C, expense_id: Uuid) -> ResultEngine<Expense>
where
    C: ConnectionTrait,
{
    let model = expenses::Entity::find_by_id(expense_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("expense {expense_id}")))?;
    Expense::try_from(model)
}

pub(super) async fn insert_expense<C>(db: &C, expense: &Expense) -> ResultEngine<()>
where
    C: ConnectionTrait,
{
    expenses::ActiveModel::from(expense).insert(db).await?;
    Ok(())
}

/// Write `next` only if the stored row is still at `expected_version`.
pub(super) async fn commit_expense<C>(
    db: &C,
    next: &Expense,
    expected_version: i64,
) -> ResultEngine<()>
where
    C: ConnectionTrait,
{
    let mut active = expenses::ActiveModel::from(next);
    active.id = ActiveValue::NotSet;
    let result = expenses::Entity::update_many()
        .set(active)
        .filter(expenses::Column::Id.eq(next.id.to_string()))
        .filter(expenses::Column::Version.eq(expected_version))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(EngineError::VersionConflict(next.id.to_string()));
    }
    Ok(())
}

/// Mark `expense` as being pushed by the holder of `token`.
///
/// Succeeds only while the row is unpushed, still on the same assignment,
/// and free of a claim younger than `lease`. Does not touch the version.
pub(super) async fn claim_push<C>(
    db: &C,
    expense: &Expense,
    token: &str,
    lease: Duration,
) -> ResultEngine<bool>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let lapsed_before = TimeDelta::from_std(lease)
        .ok()
        .and_then(|lease| now.checked_sub_signed(lease))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let result = expenses::Entity::update_many()
        .col_expr(expenses::Column::PushClaim, Expr::value(token))
        .col_expr(expenses::Column::PushClaimedAt, Expr::value(now))
        .filter(expenses::Column::Id.eq(expense.id.to_string()))
        .filter(expenses::Column::ZohoExpenseId.is_null())
        .filter(expenses::Column::AssignmentGeneration.eq(expense.assignment_generation))
        .filter(
            Condition::any()
                .add(expenses::Column::PushClaim.is_null())
                .add(expenses::Column::PushClaimedAt.lt(lapsed_before)),
        )
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Drop the claim taken with `token`, if it is still ours.
pub(super) async fn release_push<C>(db: &C, expense_id: Uuid, token: &str) -> ResultEngine<()>
where
    C: ConnectionTrait,
{
    expenses::Entity::update_many()
        .col_expr(expenses::Column::PushClaim, Expr::value(Option::<String>::None))
        .col_expr(
            expenses::Column::PushClaimedAt,
            Expr::value(Option::<DateTime<Utc>>::None),
        )
        .filter(expenses::Column::Id.eq(expense_id.to_string()))
        .filter(expenses::Column::PushClaim.eq(token))
        .exec(db)
        .await?;
    Ok(())
}

/// Commit time for the next entry of `expense_id`: never earlier than the
/// previous entry.
pub(super) async fn next_timestamp<C>(db: &C, expense_id: Uuid) -> ResultEngine<DateTime<Utc>>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let last = audit::Entity::find()
        .filter(audit::Column::ExpenseId.eq(expense_id.to_string()))
        .order_by_desc(audit::Column::Seq)
        .one(db)
        .await?;
    Ok(last.map_or(now, |entry| entry.timestamp.max(now)))
}

pub(super) async fn append_audit<C>(
    db: &C,
    expense: &Expense,
    acting_user_id: &str,
    action: AuditAction,
    changes: ChangeSet,
) -> ResultEngine<AuditEntry>
where
    C: ConnectionTrait,
{
    let entry = AuditEntry {
        id: Uuid::new_v4(),
        expense_id: expense.id,
        seq: expense.version,
        acting_user_id: acting_user_id.to_string(),
        action,
        changes,
        timestamp: expense.updated_at,
    };
    entry.to_active()?.insert(db).await?;
    Ok(entry)
}

pub(super) async fn list_audit<C>(db: &C, expense_id: Uuid) -> ResultEngine<Vec<AuditEntry>>
where
    C: ConnectionTrait,
{
    audit::Entity::find()
        .filter(audit::Column::ExpenseId.eq(expense_id.to_string()))
        .order_by_asc(audit::Column::Seq)
        .all(db)
        .await?
        .into_iter()
        .map(AuditEntry::try_from)
        .collect()
}
