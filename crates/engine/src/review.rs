//! Review and reimbursement state machines.
//!
//! Both machines are pure: they receive the current state and the requested
//! one and either return the next state or the rule that was violated. Role
//! checks happen before they are consulted.
//!
//! Review: `pending -> {approved, rejected}` and `approved <-> rejected`.
//! `pending` is only ever the creation default.
//!
//! Reimbursement (only while reimbursement is required):
//! `pending_review -> {approved, rejected}`, `approved <-> rejected`,
//! `approved -> paid`. `paid` is final and requires the expense itself to be
//! approved.

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl TryFrom<&str> for ReviewStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(EngineError::InvalidInput(format!(
                "invalid review status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReimbursementStatus {
    PendingReview,
    Approved,
    Rejected,
    Paid,
}

impl ReimbursementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Paid => "paid",
        }
    }
}

impl TryFrom<&str> for ReimbursementStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending_review" | "pending review" => Ok(Self::PendingReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "paid" => Ok(Self::Paid),
            other => Err(EngineError::InvalidInput(format!(
                "invalid reimbursement status: {other}"
            ))),
        }
    }
}

/// Next review status. Re-selecting the current status is allowed and still
/// counts as a review action.
pub fn next_status(current: ReviewStatus, requested: ReviewStatus) -> ResultEngine<ReviewStatus> {
    if requested == ReviewStatus::Pending {
        return Err(EngineError::InvalidTransition(format!(
            "cannot move a {} expense back to pending",
            current.as_str()
        )));
    }
    Ok(requested)
}

/// Next reimbursement status.
pub fn next_reimbursement(
    expense_status: ReviewStatus,
    required: bool,
    current: Option<ReimbursementStatus>,
    requested: ReimbursementStatus,
) -> ResultEngine<ReimbursementStatus> {
    use ReimbursementStatus::*;

    if !required {
        return Err(EngineError::PreconditionFailed(
            "reimbursement is not required for this expense".to_string(),
        ));
    }
    let current = current.unwrap_or(PendingReview);

    match (current, requested) {
        (Paid, Paid) => Ok(Paid),
        (Paid, _) => Err(EngineError::InvalidTransition(
            "a paid reimbursement cannot change".to_string(),
        )),
        (Approved, Paid) if expense_status != ReviewStatus::Approved => {
            Err(EngineError::InvalidTransition(format!(
                "cannot pay out a {} expense",
                expense_status.as_str()
            )))
        }
        (Approved, Paid) => Ok(Paid),
        (_, Paid) => Err(EngineError::InvalidTransition(format!(
            "reimbursement must be approved before it is paid (currently {})",
            current.as_str()
        ))),
        (PendingReview, PendingReview) => Ok(PendingReview),
        (_, PendingReview) => Err(EngineError::InvalidTransition(format!(
            "cannot move a {} reimbursement back to pending review",
            current.as_str()
        ))),
        (_, next @ (Approved | Rejected)) => Ok(next),
    }
}

/// Reimbursement status after `required` was (re)evaluated by an edit.
///
/// Turning the requirement on opens a review; turning it off drops the
/// sub-state unless money already left.
pub fn reimbursement_for_requirement(
    was_required: bool,
    required: bool,
    current: Option<ReimbursementStatus>,
) -> ResultEngine<Option<ReimbursementStatus>> {
    match (was_required, required) {
        (false, true) => Ok(Some(ReimbursementStatus::PendingReview)),
        (true, false) if current == Some(ReimbursementStatus::Paid) => {
            Err(EngineError::InvalidTransition(
                "reimbursement was already paid".to_string(),
            ))
        }
        (true, false) => Ok(None),
        (true, true) => Ok(current.or(Some(ReimbursementStatus::PendingReview))),
        (false, false) => Ok(None),
    }
}
