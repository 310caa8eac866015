//! Card option to forced-reimbursement rule table.
//!
//! Evaluated once per create/edit. When a rule forces reimbursement the flag
//! cannot be turned off while that card stays selected.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRule {
    /// Case-insensitive substring of the card option.
    pub pattern: String,
    pub forces_reimbursement: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardRules(Vec<CardRule>);

impl Default for CardRules {
    fn default() -> Self {
        Self(vec![CardRule {
            pattern: "personal".to_string(),
            forces_reimbursement: true,
        }])
    }
}

impl CardRules {
    pub fn new(rules: Vec<CardRule>) -> Self {
        Self(rules)
    }

    pub fn rules(&self) -> &[CardRule] {
        &self.0
    }

    /// Whether `card` matches a rule that forces reimbursement.
    pub fn forces_reimbursement(&self, card: Option<&str>) -> bool {
        let Some(card) = card else {
            return false;
        };
        let card = card.to_lowercase();
        self.0.iter().any(|rule| {
            rule.forces_reimbursement
                && !rule.pattern.is_empty()
                && card.contains(&rule.pattern.to_lowercase())
        })
    }

    /// Effective `reimbursement_required` for a record using `card`.
    ///
    /// `requested` is what the caller asked for; `None` keeps `current`.
    pub fn resolve(&self, card: Option<&str>, requested: Option<bool>, current: bool) -> bool {
        if self.forces_reimbursement(card) {
            return true;
        }
        requested.unwrap_or(current)
    }
}
