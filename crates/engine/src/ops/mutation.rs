//! Read-modify-write of one expense with its single audit entry.

use sea_orm::TransactionTrait;
use uuid::Uuid;

use crate::{Actor, AuditAction, AuditEntry, ChangeSet, EngineError, Expense, ResultEngine};

use super::{Engine, store, with_tx};

#[derive(Clone, Debug)]
pub(super) struct Mutation {
    pub before: Expense,
    pub after: Expense,
    pub entry: AuditEntry,
}

impl Engine {
    /// Apply `plan` to the current record under the expense lock.
    ///
    /// `plan` is pure: it receives the resolved actor and the stored record
    /// and returns the desired record. It may run twice if the optimistic
    /// version check fails once. `action` overrides the label derived from
    /// the change set.
    pub(super) async fn mutate<F>(
        &self,
        expense_id: Uuid,
        user_id: &str,
        action: Option<AuditAction>,
        plan: F,
    ) -> ResultEngine<Mutation>
    where
        F: Fn(&Actor, &Expense) -> ResultEngine<Expense>,
    {
        let _guard = self.locks.acquire(expense_id).await;
        let actor = self.actor(&self.database, user_id).await?;

        let mutation = match self.mutate_once(expense_id, &actor, action, &plan).await {
            Err(EngineError::VersionConflict(id)) => {
                tracing::warn!(expense_id = %id, "version conflict, retrying once");
                self.mutate_once(expense_id, &actor, action, &plan).await?
            }
            other => other?,
        };

        let entry = &mutation.entry;
        if mutation.after.stale_push() && !mutation.before.stale_push() {
            tracing::warn!(
                expense_id = %expense_id,
                external_id = ?mutation.after.zoho_expense_id,
                "pushed expense changed, ledger copy is now stale"
            );
        }
        tracing::info!(
            expense_id = %expense_id,
            user_id = %actor.user_id,
            action = entry.action.as_str(),
            seq = entry.seq,
            fields = entry.changes.len(),
            "expense mutation committed"
        );
        Ok(mutation)
    }

    async fn mutate_once<F>(
        &self,
        expense_id: Uuid,
        actor: &Actor,
        action: Option<AuditAction>,
        plan: &F,
    ) -> ResultEngine<Mutation>
    where
        F: Fn(&Actor, &Expense) -> ResultEngine<Expense>,
    {
        with_tx!(self, |db_tx| {
            let before = store::load_expense(&db_tx, expense_id).await?;
            #[cfg(test)]
            tests::interleave_writer(&db_tx, expense_id).await?;
            let mut after = plan(actor, &before)?;
            after.id = before.id;
            after.submitted_by = before.submitted_by.clone();
            after.created_at = before.created_at;
            after.version = before.version + 1;
            after.updated_at = store::next_timestamp(&db_tx, expense_id).await?;
            after.check_invariants()?;

            let changes = ChangeSet::diff(&before, &after);
            if changes.is_empty() && !before.stale_push() && before.pushed_version.is_some() {
                // nothing the ledger sees moved
                after.pushed_version = Some(after.version);
            }
            let action = action.unwrap_or_else(|| changes.action_for_edit());
            store::commit_expense(&db_tx, &after, before.version).await?;
            let entry =
                store::append_audit(&db_tx, &after, &actor.user_id, action, changes).await?;
            Ok::<_, EngineError>(Mutation {
                before,
                after,
                entry,
            })
        })
    }
}
