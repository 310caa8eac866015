//! Role model and the single capability check.
//!
//! Review components never look at roles. The engine calls [`authorize`]
//! once per request, before any component runs.

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May create expenses and work on their own pending ones.
    OwnerOnly,
    Reviewer,
    Accountant,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OwnerOnly => "owner_only",
            Self::Reviewer => "reviewer",
            Self::Accountant => "accountant",
            Self::Admin => "admin",
        }
    }

    /// Reviewer-class roles may act on expenses they do not own.
    pub fn can_review(self) -> bool {
        matches!(self, Self::Reviewer | Self::Accountant | Self::Admin)
    }
}

impl TryFrom<&str> for Role {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner_only" | "owner-only" | "user" => Ok(Self::OwnerOnly),
            "reviewer" => Ok(Self::Reviewer),
            "accountant" => Ok(Self::Accountant),
            "admin" => Ok(Self::Admin),
            other => Err(EngineError::InvalidInput(format!("invalid role: {other}"))),
        }
    }
}

/// What the caller is about to do to one expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Read,
    /// Change amount, merchant, date and the other core fields.
    EditCoreFields { pending: bool },
    SetStatus,
    SetReimbursement,
    AssignEntity,
    Push,
}

/// The acting principal as resolved from the identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// Decide whether `actor` may exercise `capability` on an expense owned by
/// `owner`.
pub fn authorize(actor: &Actor, owner: &str, capability: Capability) -> ResultEngine<()> {
    if actor.role.can_review() {
        return Ok(());
    }
    let own = actor.user_id == owner;
    let allowed = match capability {
        Capability::Read => own,
        Capability::EditCoreFields { pending } => own && pending,
        Capability::SetStatus
        | Capability::SetReimbursement
        | Capability::AssignEntity
        | Capability::Push => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(EngineError::Forbidden(format!(
            "{} ({}) may not {} this expense",
            actor.user_id,
            actor.role.as_str(),
            capability_label(capability)
        )))
    }
}

fn capability_label(capability: Capability) -> &'static str {
    match capability {
        Capability::Read => "read",
        Capability::EditCoreFields { .. } => "edit",
        Capability::SetStatus => "change the status of",
        Capability::SetReimbursement => "adjudicate reimbursement for",
        Capability::AssignEntity => "assign an entity to",
        Capability::Push => "push",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owners_are_limited_to_their_pending_expenses() {
        let alice = Actor::new("alice", Role::OwnerOnly);
        assert!(authorize(&alice, "alice", Capability::Read).is_ok());
        assert!(authorize(&alice, "alice", Capability::EditCoreFields { pending: true }).is_ok());
        assert!(matches!(
            authorize(&alice, "alice", Capability::EditCoreFields { pending: false }),
            Err(EngineError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(&alice, "bob", Capability::Read),
            Err(EngineError::Forbidden(_))
        ));
    }

    #[test]
    fn owners_cannot_review_their_own_expenses() {
        let alice = Actor::new("alice", Role::OwnerOnly);
        for capability in [
            Capability::SetStatus,
            Capability::SetReimbursement,
            Capability::AssignEntity,
            Capability::Push,
        ] {
            assert!(authorize(&alice, "alice", capability).is_err(), "{capability:?}");
        }
    }

    #[test]
    fn reviewer_class_roles_act_on_any_expense() {
        for role in [Role::Reviewer, Role::Accountant, Role::Admin] {
            let actor = Actor::new("rita", role);
            assert!(authorize(&actor, "alice", Capability::Push).is_ok());
            assert!(authorize(&actor, "alice", Capability::EditCoreFields { pending: false }).is_ok());
        }
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::try_from("Admin").unwrap(), Role::Admin);
        assert_eq!(Role::try_from("owner-only").unwrap(), Role::OwnerOnly);
        assert!(Role::try_from("superuser").is_err());
    }
}
