use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Amount, AuditAction, Capability, ChangeSet, CreateExpenseCmd, EngineError, Expense,
    ReimbursementStatus, ResultEngine, ReviewStatus, UpdateExpenseCmd, assignment, authorize,
    expenses, review,
    util::{normalize_optional_text, normalize_required_text},
};

use super::{Engine, ExpenseView, store, with_tx};

/// Filters for listing expenses. Date bounds are inclusive.
#[derive(Clone, Debug, Default)]
pub struct ExpenseListFilter {
    pub submitted_by: Option<String>,
    pub status: Option<ReviewStatus>,
    pub zoho_entity: Option<String>,
    pub event_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// `Some(true)` only pushed, `Some(false)` only unpushed.
    pub pushed: Option<bool>,
}

fn validate_list_filter(filter: &ExpenseListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from > to
    {
        return Err(EngineError::InvalidInput(
            "invalid range: from must be <= to".to_string(),
        ));
    }
    Ok(())
}

fn validate_amount(amount_minor: i64) -> ResultEngine<i64> {
    if !Amount::new(amount_minor).is_positive() {
        return Err(EngineError::InvalidInput("amount must be > 0".to_string()));
    }
    Ok(amount_minor)
}

impl Engine {
    /// Canonical spelling of `category`, checked against the allow-list when
    /// one is configured.
    fn validate_category(&self, category: &str) -> ResultEngine<String> {
        let category = normalize_required_text(category, "category")?;
        if self.categories.is_empty() {
            return Ok(category);
        }
        self.categories
            .iter()
            .find(|known| known.eq_ignore_ascii_case(&category))
            .cloned()
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown category: {category}")))
    }

    /// Create an expense owned by `cmd.user_id`.
    ///
    /// Receipt suggestions fill only the fields the caller left empty.
    pub async fn create_expense(&self, cmd: CreateExpenseCmd) -> ResultEngine<ExpenseView> {
        let CreateExpenseCmd {
            user_id,
            amount_minor,
            category,
            merchant,
            date,
            card_used,
            description,
            location,
            event_id,
            reimbursement_required,
            suggestion,
        } = cmd;
        let suggestion = suggestion.unwrap_or_default();

        let amount_minor = amount_minor
            .or(suggestion.amount_minor)
            .ok_or_else(|| EngineError::InvalidInput("amount is required".to_string()))
            .and_then(validate_amount)?;
        let merchant = merchant
            .or(suggestion.merchant)
            .ok_or_else(|| EngineError::InvalidInput("merchant is required".to_string()))?;
        let merchant = normalize_required_text(&merchant, "merchant")?;
        let category = category
            .or(suggestion.category)
            .ok_or_else(|| EngineError::InvalidInput("category is required".to_string()))?;
        let category = self.validate_category(&category)?;
        let date = date
            .or(suggestion.date)
            .ok_or_else(|| EngineError::InvalidInput("date is required".to_string()))?;
        let card_used = normalize_optional_text(card_used.as_deref());
        let required = self
            .card_rules
            .resolve(card_used.as_deref(), reimbursement_required, false);

        let now = Utc::now();
        let expense = Expense {
            id: Uuid::new_v4(),
            submitted_by: user_id.clone(),
            event_id: normalize_optional_text(event_id.as_deref()),
            amount_minor,
            category,
            merchant,
            date,
            card_used,
            description: normalize_optional_text(description.as_deref()),
            location: normalize_optional_text(location.or(suggestion.location).as_deref()),
            status: ReviewStatus::Pending,
            reimbursement_required: required,
            reimbursement_status: required.then_some(ReimbursementStatus::PendingReview),
            zoho_entity: None,
            zoho_expense_id: None,
            assignment_generation: 0,
            pushed_version: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        expense.check_invariants()?;

        with_tx!(self, |db_tx| {
            let actor = self.actor(&db_tx, &user_id).await?;
            store::insert_expense(&db_tx, &expense).await?;
            store::append_audit(
                &db_tx,
                &expense,
                &actor.user_id,
                AuditAction::Created,
                ChangeSet::created(&expense),
            )
            .await?;
            Ok::<_, EngineError>(())
        })?;

        tracing::info!(
            expense_id = %expense.id,
            user_id = %user_id,
            amount = %Amount::new(expense.amount_minor),
            reimbursement_required = expense.reimbursement_required,
            "expense created"
        );
        self.view(expense).await
    }

    /// Multi-field edit. Core fields, status, reimbursement and entity may
    /// be combined; the call produces one audit entry either way.
    pub async fn update_expense(&self, cmd: UpdateExpenseCmd) -> ResultEngine<ExpenseView> {
        let mutation = self
            .mutate(cmd.expense_id, &cmd.user_id, None, |actor, current| {
                let owner = current.submitted_by.as_str();
                let mut checked = false;
                if cmd.touches_core_fields() {
                    let pending = current.status == ReviewStatus::Pending;
                    authorize(actor, owner, Capability::EditCoreFields { pending })?;
                    checked = true;
                }
                if cmd.status.is_some() {
                    authorize(actor, owner, Capability::SetStatus)?;
                    checked = true;
                }
                if cmd.reimbursement_status.is_some() {
                    authorize(actor, owner, Capability::SetReimbursement)?;
                    checked = true;
                }
                if cmd.zoho_entity.is_some() {
                    authorize(actor, owner, Capability::AssignEntity)?;
                    checked = true;
                }
                if !checked {
                    authorize(actor, owner, Capability::Read)?;
                }

                let mut next = current.clone();
                if let Some(amount_minor) = cmd.amount_minor {
                    next.amount_minor = validate_amount(amount_minor)?;
                }
                if let Some(category) = cmd.category.as_deref() {
                    next.category = self.validate_category(category)?;
                }
                if let Some(merchant) = cmd.merchant.as_deref() {
                    next.merchant = normalize_required_text(merchant, "merchant")?;
                }
                if let Some(date) = cmd.date {
                    next.date = date;
                }
                if let Some(card) = cmd.card_used.as_deref() {
                    next.card_used = normalize_optional_text(Some(card));
                }
                if let Some(description) = cmd.description.as_deref() {
                    next.description = normalize_optional_text(Some(description));
                }
                if let Some(location) = cmd.location.as_deref() {
                    next.location = normalize_optional_text(Some(location));
                }
                if let Some(event_id) = cmd.event_id.as_deref() {
                    next.event_id = normalize_optional_text(Some(event_id));
                }

                let required = self.card_rules.resolve(
                    next.card_used.as_deref(),
                    cmd.reimbursement_required,
                    current.reimbursement_required,
                );
                next.reimbursement_status = review::reimbursement_for_requirement(
                    current.reimbursement_required,
                    required,
                    current.reimbursement_status,
                )?;
                next.reimbursement_required = required;

                if let Some(status) = cmd.status {
                    next.status = review::next_status(current.status, status)?;
                }
                if let Some(requested) = cmd.reimbursement_status {
                    next.reimbursement_status = Some(review::next_reimbursement(
                        next.status,
                        next.reimbursement_required,
                        next.reimbursement_status,
                        requested,
                    )?);
                }
                if let Some(entity) = cmd.zoho_entity.as_deref()
                    && let Some(change) = assignment::plan(&next, entity)
                {
                    assignment::apply(&mut next, change);
                }
                Ok(next)
            })
            .await?;
        super::assignment::log_reconciliation(&mutation);
        self.view(mutation.after).await
    }

    /// One expense with fresh warnings.
    pub async fn expense(&self, expense_id: Uuid, user_id: &str) -> ResultEngine<ExpenseView> {
        let actor = self.actor(&self.database, user_id).await?;
        let expense = store::load_expense(&self.database, expense_id).await?;
        authorize(&actor, &expense.submitted_by, Capability::Read)?;
        self.view(expense).await
    }

    /// Expenses visible to `user_id`, newest first. Owner-only users always
    /// see just their own.
    pub async fn list_expenses(
        &self,
        user_id: &str,
        filter: &ExpenseListFilter,
    ) -> ResultEngine<Vec<ExpenseView>> {
        validate_list_filter(filter)?;
        let actor = self.actor(&self.database, user_id).await?;

        let mut query = expenses::Entity::find();
        let owner = if actor.role.can_review() {
            filter.submitted_by.clone()
        } else {
            Some(actor.user_id.clone())
        };
        if let Some(owner) = owner {
            query = query.filter(expenses::Column::SubmittedBy.eq(owner));
        }
        if let Some(status) = filter.status {
            query = query.filter(expenses::Column::Status.eq(status.as_str()));
        }
        if let Some(entity) = filter.zoho_entity.as_deref() {
            query = query.filter(expenses::Column::ZohoEntity.eq(entity));
        }
        if let Some(event_id) = filter.event_id.as_deref() {
            query = query.filter(expenses::Column::EventId.eq(event_id));
        }
        if let Some(from) = filter.from {
            query = query.filter(expenses::Column::Date.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(expenses::Column::Date.lte(to));
        }
        match filter.pushed {
            Some(true) => query = query.filter(expenses::Column::ZohoExpenseId.is_not_null()),
            Some(false) => query = query.filter(expenses::Column::ZohoExpenseId.is_null()),
            None => {}
        }

        let items = query
            .order_by_desc(expenses::Column::Date)
            .order_by_desc(expenses::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Expense::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        self.views(items).await
    }

    pub(super) async fn view(&self, expense: Expense) -> ResultEngine<ExpenseView> {
        let mut views = self.views(vec![expense]).await?;
        views
            .pop()
            .ok_or_else(|| EngineError::KeyNotFound("expense".to_string()))
    }

    /// Attach duplicate warnings and the stale-push flag. Candidates are
    /// loaded once for the whole batch.
    pub(super) async fn views(&self, items: Vec<Expense>) -> ResultEngine<Vec<ExpenseView>> {
        let Some(min_date) = items.iter().map(|e| e.date).min() else {
            return Ok(Vec::new());
        };
        let max_date = items.iter().map(|e| e.date).max().unwrap_or(min_date);
        let (from, _) = self.duplicates.window(min_date);
        let (_, to) = self.duplicates.window(max_date);
        let owners: BTreeSet<&str> = items.iter().map(|e| e.submitted_by.as_str()).collect();

        let candidates = expenses::Entity::find()
            .filter(expenses::Column::SubmittedBy.is_in(owners))
            .filter(expenses::Column::Date.gte(from))
            .filter(expenses::Column::Date.lte(to))
            .all(&self.database)
            .await?
            .into_iter()
            .map(Expense::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(items
            .into_iter()
            .map(|expense| ExpenseView {
                duplicate_check: self.duplicates.find(&expense, &candidates),
                stale_push: expense.stale_push(),
                expense,
            })
            .collect())
    }
}
