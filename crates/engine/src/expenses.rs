//! Expense records.
//!
//! An `Expense` is created by its owner and then moved through review,
//! reimbursement adjudication, entity assignment and ledger push. The row is
//! never deleted.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ReimbursementStatus, ResultEngine, ReviewStatus, util::parse_uuid,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub submitted_by: String,
    pub event_id: Option<String>,
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
    /// Bumped each time `zoho_entity` changes. Part of the ledger
    /// idempotency key.
    pub assignment_generation: i64,
    /// `version` written by the push that set `zoho_expense_id`.
    pub pushed_version: Option<i64>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    /// Pushed, then changed afterwards: the ledger copy may be out of date.
    pub fn stale_push(&self) -> bool {
        match (&self.zoho_expense_id, self.pushed_version) {
            (Some(_), Some(pushed)) => self.version > pushed,
            _ => false,
        }
    }

    /// Key forwarded to the ledger; stable for one entity assignment.
    pub fn ledger_idempotency_key(&self) -> String {
        format!("{}-{}", self.id, self.assignment_generation)
    }

    /// Record-level invariants that must hold after every mutation.
    pub(crate) fn check_invariants(&self) -> ResultEngine<()> {
        if self.zoho_expense_id.is_some() && self.zoho_entity.is_none() {
            return Err(EngineError::PreconditionFailed(
                "a pushed expense must keep its entity".to_string(),
            ));
        }
        if self.reimbursement_required != self.reimbursement_status.is_some() {
            return Err(EngineError::PreconditionFailed(
                "reimbursement status must be set exactly when reimbursement is required"
                    .to_string(),
            ));
        }
        if self.amount_minor <= 0 {
            return Err(EngineError::InvalidInput("amount must be > 0".to_string()));
        }
        if self.merchant.trim().is_empty() || self.category.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "merchant and category are required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub submitted_by: String,
    pub event_id: Option<String>,
    pub amount_minor: i64,
    pub category: String,
    pub merchant: String,
    pub date: Date,
    pub card_used: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub reimbursement_required: bool,
    pub reimbursement_status: Option<String>,
    pub zoho_entity: Option<String>,
    pub zoho_expense_id: Option<String>,
    pub assignment_generation: i64,
    pub pushed_version: Option<i64>,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    /// Token of the writer currently calling the ledger for this row.
    pub push_claim: Option<String>,
    pub push_claimed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.to_string()),
            submitted_by: ActiveValue::Set(expense.submitted_by.clone()),
            event_id: ActiveValue::Set(expense.event_id.clone()),
            amount_minor: ActiveValue::Set(expense.amount_minor),
            category: ActiveValue::Set(expense.category.clone()),
            merchant: ActiveValue::Set(expense.merchant.clone()),
            date: ActiveValue::Set(expense.date),
            card_used: ActiveValue::Set(expense.card_used.clone()),
            description: ActiveValue::Set(expense.description.clone()),
            location: ActiveValue::Set(expense.location.clone()),
            status: ActiveValue::Set(expense.status.as_str().to_string()),
            reimbursement_required: ActiveValue::Set(expense.reimbursement_required),
            reimbursement_status: ActiveValue::Set(
                expense.reimbursement_status.map(|s| s.as_str().to_string()),
            ),
            zoho_entity: ActiveValue::Set(expense.zoho_entity.clone()),
            zoho_expense_id: ActiveValue::Set(expense.zoho_expense_id.clone()),
            assignment_generation: ActiveValue::Set(expense.assignment_generation),
            pushed_version: ActiveValue::Set(expense.pushed_version),
            version: ActiveValue::Set(expense.version),
            created_at: ActiveValue::Set(expense.created_at),
            updated_at: ActiveValue::Set(expense.updated_at),
            push_claim: ActiveValue::NotSet,
            push_claimed_at: ActiveValue::NotSet,
        }
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "expense")?,
            submitted_by: model.submitted_by,
            event_id: model.event_id,
            amount_minor: model.amount_minor,
            category: model.category,
            merchant: model.merchant,
            date: model.date,
            card_used: model.card_used,
            description: model.description,
            location: model.location,
            status: ReviewStatus::try_from(model.status.as_str())?,
            reimbursement_required: model.reimbursement_required,
            reimbursement_status: model
                .reimbursement_status
                .as_deref()
                .map(ReimbursementStatus::try_from)
                .transpose()?,
            zoho_entity: model.zoho_entity,
            zoho_expense_id: model.zoho_expense_id,
            assignment_generation: model.assignment_generation,
            pushed_version: model.pushed_version,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
