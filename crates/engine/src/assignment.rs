//! Entity assignment rules.
//!
//! Changing the entity of a pushed expense is a reconciliation event: the
//! external id is cleared in the same mutation and the expense may be pushed
//! once more under the new entity. Nothing is retracted from the ledger.

use crate::{Expense, util::normalize_optional_text};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reassignment {
    pub entity: Option<String>,
    /// External id made stale by this change, if any.
    pub cleared_external_id: Option<String>,
}

impl Reassignment {
    pub fn is_reconciliation(&self) -> bool {
        self.cleared_external_id.is_some()
    }
}

/// Plan an entity change. Blank input unassigns. Returns `None` when the
/// entity stays the same.
pub fn plan(expense: &Expense, requested: &str) -> Option<Reassignment> {
    let entity = normalize_optional_text(Some(requested));
    if entity == expense.zoho_entity {
        return None;
    }
    Some(Reassignment {
        entity,
        cleared_external_id: expense.zoho_expense_id.clone(),
    })
}

/// Apply a planned change to `expense`.
pub fn apply(expense: &mut Expense, change: Reassignment) {
    expense.zoho_entity = change.entity;
    expense.zoho_expense_id = None;
    expense.pushed_version = None;
    expense.assignment_generation += 1;
}
