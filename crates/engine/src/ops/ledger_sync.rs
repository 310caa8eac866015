//! One-way push of expenses to the external ledger.
//!
//! At most one ledger entry is created per entity assignment. Within a
//! process the expense lock is held from the "already pushed?" check until
//! the external id is committed. Across processes a leased claim on the row
//! is taken before the ledger is called. The ledger call is bounded by a
//! timeout and no DB transaction is open while it runs.

use std::collections::BTreeSet;

use ledger::{AccountHealth, LedgerError, LedgerExpense, LedgerReceipt};
use sea_orm::TransactionTrait;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Actor, AuditAction, Capability, ChangeSet, EngineError, Expense, ResultEngine, authorize,
};

use super::{Engine, ExpenseView, LedgerWiring, mutation::Mutation, store, with_tx};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub view: ExpenseView,
    pub external_id: String,
    /// The expense was already pushed under its current entity; nothing was
    /// sent and no audit entry was written.
    pub already_pushed: bool,
}

fn ledger_payload(expense: &Expense) -> LedgerExpense {
    LedgerExpense {
        expense_id: expense.id.to_string(),
        date: expense.date,
        amount_minor: expense.amount_minor,
        category: expense.category.clone(),
        merchant: expense.merchant.clone(),
        description: expense.description.clone(),
        submitted_by: expense.submitted_by.clone(),
        event_id: expense.event_id.clone(),
        reimbursement_required: expense.reimbursement_required,
        idempotency_key: expense.ledger_idempotency_key(),
    }
}

impl Engine {
    pub async fn push_to_ledger(&self, expense_id: Uuid, user_id: &str) -> ResultEngine<PushOutcome> {
        let _guard = self.locks.acquire(expense_id).await;
        let actor = self.actor(&self.database, user_id).await?;
        let current = store::load_expense(&self.database, expense_id).await?;
        authorize(&actor, &current.submitted_by, Capability::Push)?;

        let Some(entity) = current.zoho_entity.clone() else {
            return Err(EngineError::PreconditionFailed(
                "no entity assigned".to_string(),
            ));
        };
        if let Some(external_id) = current.zoho_expense_id.clone() {
            tracing::debug!(%expense_id, %external_id, "already pushed, nothing to do");
            return Ok(PushOutcome {
                view: self.view(current).await?,
                external_id,
                already_pushed: true,
            });
        }
        let Some(wiring) = self.ledger.as_ref() else {
            return Err(EngineError::NotConfigured(entity));
        };
        if !wiring.directory.is_enabled(&entity).await? {
            tracing::info!(%expense_id, %entity, "ledger not configured for entity");
            return Err(EngineError::NotConfigured(entity));
        }

        // the expense lock only covers this process
        let claim = Uuid::new_v4().to_string();
        let lease = self.ledger_timeout * 2;
        if !store::claim_push(&self.database, &current, &claim, lease).await? {
            tracing::info!(%expense_id, %entity, "push already in flight");
            return Err(EngineError::Transient(format!(
                "expense {expense_id} is already being pushed"
            )));
        }
        let pushed = self.push_claimed(wiring, &actor, &current, &entity).await;
        if let Err(err) = store::release_push(&self.database, expense_id, &claim).await {
            tracing::warn!(%expense_id, %err, "push claim not released, it lapses on its own");
        }
        let (mutation, receipt) = pushed?;

        tracing::info!(
            %expense_id,
            %entity,
            external_id = %receipt.external_id,
            mock = receipt.mock,
            user_id = %actor.user_id,
            "expense pushed to ledger"
        );
        Ok(PushOutcome {
            view: self.view(mutation.after).await?,
            external_id: receipt.external_id,
            already_pushed: false,
        })
    }

    /// Ledger call and bookkeeping, run while holding the push claim.
    async fn push_claimed(
        &self,
        wiring: &LedgerWiring,
        actor: &Actor,
        current: &Expense,
        entity: &str,
    ) -> ResultEngine<(Mutation, LedgerReceipt)> {
        let expense_id = current.id;
        let payload = ledger_payload(current);
        let pushed =
            tokio::time::timeout(self.ledger_timeout, wiring.client.push(entity, &payload)).await;
        let receipt = match pushed {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(err)) => {
                match &err {
                    LedgerError::Auth(msg) => {
                        tracing::error!(%entity, %msg, "ledger rejected service credentials");
                    }
                    LedgerError::NotConfigured(_) => {
                        // a cached "enabled" answer was stale
                        wiring.directory.invalidate().await;
                    }
                    LedgerError::Transient(msg) | LedgerError::Misconfigured(msg) => {
                        tracing::warn!(%expense_id, %entity, %msg, "ledger push failed");
                    }
                }
                return Err(err.into());
            }
            Err(_) => {
                tracing::warn!(
                    %expense_id,
                    %entity,
                    timeout_ms = self.ledger_timeout.as_millis() as u64,
                    "ledger push timed out"
                );
                return Err(EngineError::Transient(format!(
                    "ledger did not answer within {:?}",
                    self.ledger_timeout
                )));
            }
        };

        match self.record_push(actor, current, &receipt.external_id).await {
            Ok(mutation) => Ok((mutation, receipt)),
            Err(err) => {
                tracing::error!(
                    %expense_id,
                    %entity,
                    external_id = %receipt.external_id,
                    %err,
                    "ledger entry created but not recorded, entry is orphaned"
                );
                Err(err)
            }
        }
    }

    /// Store the external id, provided the assignment that was pushed is
    /// still the current one.
    async fn record_push(
        &self,
        actor: &Actor,
        pushed: &Expense,
        external_id: &str,
    ) -> ResultEngine<Mutation> {
        with_tx!(self, |db_tx| {
            let before = store::load_expense(&db_tx, pushed.id).await?;
            if before.zoho_entity != pushed.zoho_entity
                || before.assignment_generation != pushed.assignment_generation
                || before.zoho_expense_id.is_some()
            {
                return Err(EngineError::VersionConflict(pushed.id.to_string()));
            }

            let mut after = before.clone();
            after.zoho_expense_id = Some(external_id.to_string());
            after.version = before.version + 1;
            after.pushed_version = Some(after.version);
            after.updated_at = store::next_timestamp(&db_tx, before.id).await?;
            after.check_invariants()?;

            let changes = ChangeSet::diff(&before, &after);
            store::commit_expense(&db_tx, &after, before.version).await?;
            let entry = store::append_audit(
                &db_tx,
                &after,
                &actor.user_id,
                AuditAction::PushedToZoho,
                changes,
            )
            .await?;
            Ok::<_, EngineError>(Mutation {
                before,
                after,
                entry,
            })
        })
    }

    /// Entities that currently have a working ledger integration.
    pub async fn ledger_entities(&self) -> ResultEngine<BTreeSet<String>> {
        match self.ledger.as_ref() {
            Some(wiring) => Ok(wiring.directory.entities().await?),
            None => Ok(BTreeSet::new()),
        }
    }

    /// Per-entity connectivity report. Reviewer-class roles only.
    pub async fn ledger_health(&self, user_id: &str) -> ResultEngine<Vec<AccountHealth>> {
        let actor = self.actor(&self.database, user_id).await?;
        if !actor.role.can_review() {
            return Err(EngineError::Forbidden(format!(
                "{} may not inspect ledger accounts",
                actor.user_id
            )));
        }
        match self.ledger.as_ref() {
            Some(wiring) => Ok(wiring.client.health().await),
            None => Ok(Vec::new()),
        }
    }
}
