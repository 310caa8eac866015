//! Append-only audit trail of expense mutations.
//!
//! Exactly one [`AuditEntry`] is written per mutating call. Its `seq` is the
//! expense `version` the call produced, so `(expense_id, seq)` orders an
//! expense's history even when two entries share a timestamp.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{EngineError, Expense, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    StatusChanged,
    EntityAssigned,
    PushedToZoho,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::StatusChanged => "status_changed",
            Self::EntityAssigned => "entity_assigned",
            Self::PushedToZoho => "pushed_to_zoho",
        }
    }
}

impl TryFrom<&str> for AuditAction {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "status_changed" => Ok(Self::StatusChanged),
            "entity_assigned" => Ok(Self::EntityAssigned),
            "pushed_to_zoho" => Ok(Self::PushedToZoho),
            other => Err(EngineError::InvalidInput(format!(
                "invalid audit action: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Field name to `{old, new}` for every field a mutation touched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, FieldChange>);

/// Tracked fields, in their external (camelCase) names.
fn tracked_fields(expense: &Expense) -> [(&'static str, Value); 13] {
    [
        ("amount", json!(crate::Amount::new(expense.amount_minor).to_string())),
        ("category", json!(expense.category)),
        ("merchant", json!(expense.merchant)),
        ("date", json!(expense.date.format("%Y-%m-%d").to_string())),
        ("cardUsed", json!(expense.card_used)),
        ("description", json!(expense.description)),
        ("location", json!(expense.location)),
        ("eventId", json!(expense.event_id)),
        ("status", json!(expense.status.as_str())),
        ("reimbursementRequired", json!(expense.reimbursement_required)),
        (
            "reimbursementStatus",
            json!(expense.reimbursement_status.map(|s| s.as_str())),
        ),
        ("zohoEntity", json!(expense.zoho_entity)),
        ("zohoExpenseId", json!(expense.zoho_expense_id)),
    ]
}

impl ChangeSet {
    /// Every tracked field that differs between `before` and `after`.
    pub fn diff(before: &Expense, after: &Expense) -> Self {
        let mut changes = BTreeMap::new();
        for ((name, old), (_, new)) in tracked_fields(before)
            .into_iter()
            .zip(tracked_fields(after))
        {
            if old != new {
                changes.insert(name.to_string(), FieldChange { old, new });
            }
        }
        Self(changes)
    }

    /// Creation entry: every non-empty field, from `null`.
    pub fn created(expense: &Expense) -> Self {
        let changes = tracked_fields(expense)
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, new)| {
                (
                    name.to_string(),
                    FieldChange {
                        old: Value::Null,
                        new,
                    },
                )
            })
            .collect();
        Self(changes)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.0.iter().map(|(name, change)| (name.as_str(), change))
    }

    /// Action label for a generic edit: a call touching only the status or
    /// only the entity keeps the specific label.
    pub fn action_for_edit(&self) -> AuditAction {
        let only = |fields: &[&str]| !self.is_empty() && self.fields().all(|f| fields.contains(&f));
        if only(&["status"]) {
            AuditAction::StatusChanged
        } else if only(&["zohoEntity", "zohoExpenseId"]) {
            AuditAction::EntityAssigned
        } else {
            AuditAction::Updated
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub seq: i64,
    pub acting_user_id: String,
    pub action: AuditAction,
    pub changes: ChangeSet,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_audit_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub expense_id: String,
    pub seq: i64,
    pub acting_user_id: String,
    pub action: String,
    pub changes: String,
    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl AuditEntry {
    pub(crate) fn to_active(&self) -> ResultEngine<ActiveModel> {
        let changes = serde_json::to_string(&self.changes)
            .map_err(|err| EngineError::InvalidInput(format!("unserializable changes: {err}")))?;
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id.to_string()),
            expense_id: ActiveValue::Set(self.expense_id.to_string()),
            seq: ActiveValue::Set(self.seq),
            acting_user_id: ActiveValue::Set(self.acting_user_id.clone()),
            action: ActiveValue::Set(self.action.as_str().to_string()),
            changes: ActiveValue::Set(changes),
            timestamp: ActiveValue::Set(self.timestamp),
        })
    }
}

impl TryFrom<Model> for AuditEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let changes = serde_json::from_str(&model.changes).map_err(|err| {
            EngineError::InvalidInput(format!("corrupt audit changes for {}: {err}", model.id))
        })?;
        Ok(Self {
            id: parse_uuid(&model.id, "audit entry")?,
            expense_id: parse_uuid(&model.expense_id, "expense")?,
            seq: model.seq,
            acting_user_id: model.acting_user_id,
            action: AuditAction::try_from(model.action.as_str())?,
            changes,
            timestamp: model.timestamp,
        })
    }
}
