//! Command structs for engine operations.
//!
//! These types group parameters for write operations (create/edit), keeping
//! call sites readable and avoiding long argument lists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ReimbursementStatus, ReviewStatus};

/// Best-effort field values extracted from a receipt.
///
/// Never authoritative: explicit fields on [`CreateExpenseCmd`] always win.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrSuggestion {
    pub merchant: Option<String>,
    pub amount_minor: Option<i64>,
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    pub location: Option<String>,
}

/// Create an expense on behalf of its owner.
#[derive(Clone, Debug)]
pub struct CreateExpenseCmd {
    pub user_id: String,
    pub amount_minor: Option<i64>,
    pub category: Option<String>,
    pub merchant: Option<String>,
    pub date: Option<NaiveDate>,
    pub card_used: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub event_id: Option<String>,
    pub reimbursement_required: Option<bool>,
    pub suggestion: Option<OcrSuggestion>,
}

impl CreateExpenseCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            amount_minor: None,
            category: None,
            merchant: None,
            date: None,
            card_used: None,
            description: None,
            location: None,
            event_id: None,
            reimbursement_required: None,
            suggestion: None,
        }
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn card_used(mut self, card: impl Into<String>) -> Self {
        self.card_used = Some(card.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    #[must_use]
    pub fn reimbursement_required(mut self, required: bool) -> Self {
        self.reimbursement_required = Some(required);
        self
    }

    #[must_use]
    pub fn suggestion(mut self, suggestion: OcrSuggestion) -> Self {
        self.suggestion = Some(suggestion);
        self
    }
}

/// Multi-field edit of an existing expense.
///
/// Every field left `None` is untouched. Optional text fields are cleared
/// with an empty string. All changes land in one mutation and one audit
/// entry.
#[derive(Clone, Debug)]
pub struct UpdateExpenseCmd {
    pub expense_id: Uuid,
    pub user_id: String,

    pub amount_minor: Option<i64>,
    pub category: Option<String>,
    pub merchant: Option<String>,
    pub date: Option<NaiveDate>,
    pub card_used: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub event_id: Option<String>,
    pub reimbursement_required: Option<bool>,

    // Reviewer-only.
    pub status: Option<ReviewStatus>,
    pub reimbursement_status: Option<ReimbursementStatus>,
    pub zoho_entity: Option<String>,
}

impl UpdateExpenseCmd {
    #[must_use]
    pub fn new(expense_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            expense_id,
            user_id: user_id.into(),
            amount_minor: None,
            category: None,
            merchant: None,
            date: None,
            card_used: None,
            description: None,
            location: None,
            event_id: None,
            reimbursement_required: None,
            status: None,
            reimbursement_status: None,
            zoho_entity: None,
        }
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn card_used(mut self, card: impl Into<String>) -> Self {
        self.card_used = Some(card.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    #[must_use]
    pub fn reimbursement_required(mut self, required: bool) -> Self {
        self.reimbursement_required = Some(required);
        self
    }

    #[must_use]
    pub fn status(mut self, status: ReviewStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn reimbursement_status(mut self, status: ReimbursementStatus) -> Self {
        self.reimbursement_status = Some(status);
        self
    }

    #[must_use]
    pub fn zoho_entity(mut self, entity: impl Into<String>) -> Self {
        self.zoho_entity = Some(entity.into());
        self
    }

    pub(crate) fn touches_core_fields(&self) -> bool {
        self.amount_minor.is_some()
            || self.category.is_some()
            || self.merchant.is_some()
            || self.date.is_some()
            || self.card_used.is_some()
            || self.description.is_some()
            || self.location.is_some()
            || self.event_id.is_some()
            || self.reimbursement_required.is_some()
    }
}
