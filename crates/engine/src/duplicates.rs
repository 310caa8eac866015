//! Advisory duplicate detection.
//!
//! Pure and read-only: matches are attached to responses as warnings and
//! never block a write.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, Expense, util::normalize_key};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicatePolicy {
    /// Maximum distance in days between the two expense dates.
    pub window_days: i64,
    /// Maximum amount difference, in minor units.
    pub amount_tolerance_minor: u64,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self {
            window_days: 1,
            amount_tolerance_minor: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub expense_id: Uuid,
    pub date: NaiveDate,
    pub merchant: String,
    pub amount_minor: i64,
}

impl DuplicatePolicy {
    /// Date range to load candidates from for an expense dated `date`.
    pub fn window(&self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        let days = chrono::Days::new(self.window_days.max(0).unsigned_abs());
        (
            date.checked_sub_days(days).unwrap_or(NaiveDate::MIN),
            date.checked_add_days(days).unwrap_or(NaiveDate::MAX),
        )
    }

    fn is_match(&self, candidate: &Expense, merchant_key: &str, other: &Expense) -> bool {
        other.id != candidate.id
            && other.submitted_by == candidate.submitted_by
            && (other.date - candidate.date).num_days().abs() <= self.window_days
            && Amount::new(other.amount_minor).distance(Amount::new(candidate.amount_minor))
                <= self.amount_tolerance_minor
            && normalize_key(&other.merchant) == merchant_key
    }

    /// Every expense in `others` that looks like a duplicate of `candidate`.
    pub fn find<'a>(
        &self,
        candidate: &Expense,
        others: impl IntoIterator<Item = &'a Expense>,
    ) -> Vec<DuplicateMatch> {
        let merchant_key = normalize_key(&candidate.merchant);
        let mut matches: Vec<DuplicateMatch> = others
            .into_iter()
            .filter(|other| self.is_match(candidate, &merchant_key, other))
            .map(|other| DuplicateMatch {
                expense_id: other.id,
                date: other.date,
                merchant: other.merchant.clone(),
                amount_minor: other.amount_minor,
            })
            .collect();
        matches.sort_by(|a, b| a.date.cmp(&b.date).then(a.expense_id.cmp(&b.expense_id)));
        matches
    }
}
