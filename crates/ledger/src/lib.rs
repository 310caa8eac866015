//! External accounting ledger boundary.
//!
//! The engine only talks to the ledger through [`LedgerClient`]. A
//! [`LedgerRouter`] dispatches each push to the account configured for the
//! expense's entity, which is either a [`MockAccount`] (no network) or a real
//! [`ZohoBooks`] organization.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

pub use directory::EntityDirectory;
pub use error::LedgerError;
pub use mock::{MockAccount, MockLedger};
pub use router::{AccountConfig, LedgerRouter};
pub use zoho::{ZohoBooks, ZohoConfig};

mod directory;
mod error;
mod mock;
mod router;
mod zoho;

pub type ResultLedger<T> = Result<T, LedgerError>;

/// Expense fields sent to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerExpense {
    pub expense_id: String,
    pub date: NaiveDate,
    pub amount_minor: i64,
    pub category: String,
    pub merchant: String,
    pub description: Option<String>,
    pub submitted_by: String,
    pub event_id: Option<String>,
    pub reimbursement_required: bool,
    /// Stable per (expense, entity assignment). Accounts that support
    /// idempotent creation should forward it.
    pub idempotency_key: String,
}

impl LedgerExpense {
    /// Amount formatted as a decimal string with two fractional digits.
    pub fn amount_decimal(&self) -> String {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }

    /// Human readable description: owner, category, event, free text.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("User: {}", self.submitted_by),
            format!("Category: {}", self.category),
        ];
        if let Some(event) = self.event_id.as_deref() {
            parts.push(format!("Event: {event}"));
        }
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            parts.push(description.to_string());
        }
        parts.join(" | ")
    }
}

/// Result of a successful push.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerReceipt {
    pub external_id: String,
    pub mock: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountHealth {
    pub entity: String,
    pub healthy: bool,
    pub mock: bool,
    pub message: String,
}

/// A single ledger organization bound to one entity.
#[async_trait]
pub trait LedgerAccount: Send + Sync {
    async fn create_expense(&self, expense: &LedgerExpense) -> ResultLedger<LedgerReceipt>;

    async fn health(&self) -> AccountHealth;
}

/// The multi-entity ledger as seen by the engine.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Create one ledger entry for `expense` under `entity`.
    async fn push(&self, entity: &str, expense: &LedgerExpense) -> ResultLedger<LedgerReceipt>;

    /// Entity codes that currently have a working ledger integration.
    async fn enabled_entities(&self) -> ResultLedger<Vec<String>>;

    async fn health(&self) -> Vec<AccountHealth> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense() -> LedgerExpense {
        LedgerExpense {
            expense_id: "e1".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            amount_minor: 4250,
            category: "Flights".to_string(),
            merchant: "Delta Airlines".to_string(),
            description: None,
            submitted_by: "alice".to_string(),
            event_id: Some("CES 2025".to_string()),
            reimbursement_required: false,
            idempotency_key: "e1-1".to_string(),
        }
    }

    #[test]
    fn amount_decimal_keeps_two_digits() {
        let mut e = expense();
        assert_eq!(e.amount_decimal(), "42.50");
        e.amount_minor = 7;
        assert_eq!(e.amount_decimal(), "0.07");
    }

    #[test]
    fn summary_skips_missing_parts() {
        let mut e = expense();
        assert_eq!(
            e.summary(),
            "User: alice | Category: Flights | Event: CES 2025"
        );
        e.event_id = None;
        e.description = Some("return leg".to_string());
        assert_eq!(e.summary(), "User: alice | Category: Flights | return leg");
    }
}
