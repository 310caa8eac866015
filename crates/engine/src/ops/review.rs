use uuid::Uuid;

use crate::{
    AuditAction, Capability, ReimbursementStatus, ResultEngine, ReviewStatus, authorize, review,
};

use super::{BulkOutcome, Engine, ExpenseView};

impl Engine {
    /// Approve or reject. Reimbursement and ledger state are left alone.
    pub async fn set_status(
        &self,
        expense_id: Uuid,
        status: ReviewStatus,
        user_id: &str,
    ) -> ResultEngine<ExpenseView> {
        let mutation = self
            .mutate(
                expense_id,
                user_id,
                Some(AuditAction::StatusChanged),
                |actor, current| {
                    authorize(actor, &current.submitted_by, Capability::SetStatus)?;
                    let mut next = current.clone();
                    next.status = review::next_status(current.status, status)?;
                    Ok(next)
                },
            )
            .await?;
        self.view(mutation.after).await
    }

    pub async fn set_reimbursement(
        &self,
        expense_id: Uuid,
        status: ReimbursementStatus,
        user_id: &str,
    ) -> ResultEngine<ExpenseView> {
        let mutation = self
            .mutate(expense_id, user_id, Some(AuditAction::Updated), |actor, current| {
                authorize(actor, &current.submitted_by, Capability::SetReimbursement)?;
                let mut next = current.clone();
                next.reimbursement_status = Some(review::next_reimbursement(
                    current.status,
                    current.reimbursement_required,
                    current.reimbursement_status,
                    status,
                )?);
                Ok(next)
            })
            .await?;
        self.view(mutation.after).await
    }

    /// `set_status` for each id independently.
    pub async fn bulk_set_status(
        &self,
        expense_ids: &[Uuid],
        status: ReviewStatus,
        user_id: &str,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for &expense_id in expense_ids {
            match self.set_status(expense_id, status, user_id).await {
                Ok(view) => outcome.succeeded.push(view),
                Err(err) => {
                    tracing::debug!(%expense_id, %err, "bulk status change skipped");
                    outcome.failed.push((expense_id, err.to_string()));
                }
            }
        }
        outcome
    }
}
