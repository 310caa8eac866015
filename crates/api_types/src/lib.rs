use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReimbursementStatus {
    PendingReview,
    Approved,
    Rejected,
    Paid,
}

/// Body of every non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    /// One of `blocked_by_permission`, `blocked_by_state`, `notice`,
    /// `transient_retry_safe`, `system_error`.
    pub category: String,
}

pub mod expense {
    use super::*;

    /// Receipt-derived defaults. Explicit fields of [`ExpenseNew`] win.
    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct OcrSuggestion {
        pub merchant: Option<String>,
        /// Decimal string, e.g. `"42.50"`.
        pub amount: Option<String>,
        pub date: Option<NaiveDate>,
        pub category: Option<String>,
        pub location: Option<String>,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExpenseNew {
        pub amount: Option<String>,
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

    /// Multi-field edit. Absent fields are untouched; an empty string clears
    /// an optional text field.
    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExpenseUpdate {
        pub amount: Option<String>,
        pub category: Option<String>,
        pub merchant: Option<String>,
        pub date: Option<NaiveDate>,
        pub card_used: Option<String>,
        pub description: Option<String>,
        pub location: Option<String>,
        pub event_id: Option<String>,
        pub reimbursement_required: Option<bool>,
        pub status: Option<ReviewStatus>,
        pub reimbursement_status: Option<ReimbursementStatus>,
        pub zoho_entity: Option<String>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct StatusUpdate {
        pub status: ReviewStatus,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReimbursementUpdate {
        pub reimbursement_status: ReimbursementStatus,
    }

    /// `null` or `""` unassigns.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct EntityUpdate {
        pub zoho_entity: Option<String>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct BulkStatus {
        pub ids: Vec<Uuid>,
        pub status: ReviewStatus,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BulkEntity {
        pub ids: Vec<Uuid>,
        pub zoho_entity: Option<String>,
    }

    /// Query string of `GET /expenses`.
    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExpenseListQuery {
        pub submitted_by: Option<String>,
        pub status: Option<ReviewStatus>,
        pub zoho_entity: Option<String>,
        pub event_id: Option<String>,
        pub from: Option<NaiveDate>,
        pub to: Option<NaiveDate>,
        pub pushed: Option<bool>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DuplicateMatch {
        pub expense_id: Uuid,
        pub date: NaiveDate,
        pub merchant: String,
        pub amount_minor: i64,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExpenseView {
        pub id: Uuid,
        pub submitted_by: String,
        pub event_id: Option<String>,
        /// Decimal string, e.g. `"42.50"`.
        pub amount: String,
        pub amount_minor: i64,
        pub category: String,
        pub merchant: String,
        pub date: NaiveDate,
        pub card_used: Option<String>,
        pub description: Option<String>,
        pub location: Option<String>,
        pub status: ReviewStatus,
        pub reimbursement_required: bool,
        pub reimbursement_status: Option<ReimbursementStatus>,
        pub zoho_entity: Option<String>,
        pub zoho_expense_id: Option<String>,
        pub version: i64,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
        pub duplicate_check: Vec<DuplicateMatch>,
        /// Pushed and changed afterwards.
        pub stale_push: bool,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExpenseListResponse {
        pub items: Vec<ExpenseView>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct BulkFailure {
        pub id: Uuid,
        pub error: String,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct BulkResponse {
        pub succeeded: Vec<ExpenseView>,
        pub failed: Vec<BulkFailure>,
    }
}

pub mod ledger {
    use super::*;

    /// Result of `POST /expenses/{id}/push`.
    ///
    /// When the entity has no ledger integration the push is answered with
    /// `202 Accepted`, no `externalId` and a `notice`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PushResponse {
        pub expense: super::expense::ExpenseView,
        pub external_id: Option<String>,
        pub already_pushed: bool,
        pub notice: Option<String>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AccountHealth {
        pub entity: String,
        pub healthy: bool,
        pub mock: bool,
        pub message: String,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LedgerHealth {
        pub enabled_entities: Vec<String>,
        pub accounts: Vec<AccountHealth>,
    }
}

pub mod audit {
    use std::collections::BTreeMap;

    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct FieldChange {
        pub old: serde_json::Value,
        pub new: serde_json::Value,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AuditEntry {
        pub seq: i64,
        pub acting_user_id: String,
        pub action: String,
        pub changes: BTreeMap<String, FieldChange>,
        pub timestamp: DateTime<Utc>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AuditTrail {
        pub expense_id: Uuid,
        pub entries: Vec<AuditEntry>,
    }
}
