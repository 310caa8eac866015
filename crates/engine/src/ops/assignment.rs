use uuid::Uuid;

use crate::{AuditAction, Capability, ResultEngine, assignment, authorize};

use super::{BulkOutcome, Engine, ExpenseView, mutation::Mutation};

pub(super) fn log_reconciliation(mutation: &Mutation) {
    if let Some(external_id) = mutation.before.zoho_expense_id.as_deref()
        && mutation.after.zoho_expense_id.is_none()
    {
        tracing::warn!(
            expense_id = %mutation.after.id,
            %external_id,
            old_entity = ?mutation.before.zoho_entity,
            new_entity = ?mutation.after.zoho_entity,
            "entity changed after push, ledger entry is orphaned"
        );
    }
}

impl Engine {
    /// Assign `entity`, or unassign with an empty string.
    ///
    /// Moving a pushed expense to another entity clears its external id in
    /// the same mutation. The ledger entry itself is left untouched.
    pub async fn assign_entity(
        &self,
        expense_id: Uuid,
        entity: &str,
        user_id: &str,
    ) -> ResultEngine<ExpenseView> {
        let mutation = self
            .mutate(
                expense_id,
                user_id,
                Some(AuditAction::EntityAssigned),
                |actor, current| {
                    authorize(actor, &current.submitted_by, Capability::AssignEntity)?;
                    let mut next = current.clone();
                    if let Some(change) = assignment::plan(current, entity) {
                        assignment::apply(&mut next, change);
                    }
                    Ok(next)
                },
            )
            .await?;
        log_reconciliation(&mutation);
        self.view(mutation.after).await
    }

    /// `assign_entity` for each id independently.
    pub async fn bulk_assign_entity(
        &self,
        expense_ids: &[Uuid],
        entity: &str,
        user_id: &str,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for &expense_id in expense_ids {
            match self.assign_entity(expense_id, entity, user_id).await {
                Ok(view) => outcome.succeeded.push(view),
                Err(err) => {
                    tracing::debug!(%expense_id, %err, "bulk entity assignment skipped");
                    outcome.failed.push((expense_id, err.to_string()));
                }
            }
        }
        outcome
    }
}
