//! Expense API endpoints and the engine to wire-type mapping shared by the
//! other handlers.

use api_types::{
    ReimbursementStatus as ApiReimbursement, ReviewStatus as ApiStatus,
    expense::{
        BulkFailure, BulkResponse, DuplicateMatch, ExpenseListQuery, ExpenseListResponse,
        ExpenseNew, ExpenseUpdate, ExpenseView, OcrSuggestion,
    },
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{Amount, ReimbursementStatus, ReviewStatus};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};

pub(crate) fn map_status(status: ReviewStatus) -> ApiStatus {
    match status {
        ReviewStatus::Pending => ApiStatus::Pending,
        ReviewStatus::Approved => ApiStatus::Approved,
        ReviewStatus::Rejected => ApiStatus::Rejected,
    }
}

pub(crate) fn status_from_api(status: ApiStatus) -> ReviewStatus {
    match status {
        ApiStatus::Pending => ReviewStatus::Pending,
        ApiStatus::Approved => ReviewStatus::Approved,
        ApiStatus::Rejected => ReviewStatus::Rejected,
    }
}

fn map_reimbursement(status: ReimbursementStatus) -> ApiReimbursement {
    match status {
        ReimbursementStatus::PendingReview => ApiReimbursement::PendingReview,
        ReimbursementStatus::Approved => ApiReimbursement::Approved,
        ReimbursementStatus::Rejected => ApiReimbursement::Rejected,
        ReimbursementStatus::Paid => ApiReimbursement::Paid,
    }
}

pub(crate) fn reimbursement_from_api(status: ApiReimbursement) -> ReimbursementStatus {
    match status {
        ApiReimbursement::PendingReview => ReimbursementStatus::PendingReview,
        ApiReimbursement::Approved => ReimbursementStatus::Approved,
        ApiReimbursement::Rejected => ReimbursementStatus::Rejected,
        ApiReimbursement::Paid => ReimbursementStatus::Paid,
    }
}

pub(crate) fn map_view(view: engine::ExpenseView) -> ExpenseView {
    let engine::ExpenseView {
        expense,
        duplicate_check,
        stale_push,
    } = view;
    ExpenseView {
        id: expense.id,
        submitted_by: expense.submitted_by,
        event_id: expense.event_id,
        amount: Amount::new(expense.amount_minor).to_string(),
        amount_minor: expense.amount_minor,
        category: expense.category,
        merchant: expense.merchant,
        date: expense.date,
        card_used: expense.card_used,
        description: expense.description,
        location: expense.location,
        status: map_status(expense.status),
        reimbursement_required: expense.reimbursement_required,
        reimbursement_status: expense.reimbursement_status.map(map_reimbursement),
        zoho_entity: expense.zoho_entity,
        zoho_expense_id: expense.zoho_expense_id,
        version: expense.version,
        created_at: expense.created_at,
        updated_at: expense.updated_at,
        duplicate_check: duplicate_check
            .into_iter()
            .map(|m| DuplicateMatch {
                expense_id: m.expense_id,
                date: m.date,
                merchant: m.merchant,
                amount_minor: m.amount_minor,
            })
            .collect(),
        stale_push,
    }
}

pub(crate) fn map_bulk(outcome: engine::BulkOutcome) -> BulkResponse {
    BulkResponse {
        succeeded: outcome.succeeded.into_iter().map(map_view).collect(),
        failed: outcome
            .failed
            .into_iter()
            .map(|(id, error)| BulkFailure { id, error })
            .collect(),
    }
}

fn parse_amount(amount: &str) -> Result<i64, ServerError> {
    let amount: Amount = amount.parse()?;
    Ok(amount.minor())
}

fn map_suggestion(suggestion: OcrSuggestion) -> engine::OcrSuggestion {
    // unreadable OCR amounts are dropped, the owner types them in
    let amount_minor = suggestion
        .amount
        .as_deref()
        .and_then(|raw| parse_amount(raw).ok());
    engine::OcrSuggestion {
        merchant: suggestion.merchant,
        amount_minor,
        date: suggestion.date,
        category: suggestion.category,
        location: suggestion.location,
    }
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseView>), ServerError> {
    let mut cmd = engine::CreateExpenseCmd::new(&user.username);
    if let Some(amount) = payload.amount.as_deref() {
        cmd = cmd.amount_minor(parse_amount(amount)?);
    }
    if let Some(category) = payload.category {
        cmd = cmd.category(category);
    }
    if let Some(merchant) = payload.merchant {
        cmd = cmd.merchant(merchant);
    }
    if let Some(date) = payload.date {
        cmd = cmd.date(date);
    }
    if let Some(card) = payload.card_used {
        cmd = cmd.card_used(card);
    }
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    if let Some(location) = payload.location {
        cmd = cmd.location(location);
    }
    if let Some(event_id) = payload.event_id {
        cmd = cmd.event_id(event_id);
    }
    if let Some(required) = payload.reimbursement_required {
        cmd = cmd.reimbursement_required(required);
    }
    if let Some(suggestion) = payload.suggestion {
        cmd = cmd.suggestion(map_suggestion(suggestion));
    }

    let view = state.engine.create_expense(cmd).await?;
    Ok((StatusCode::CREATED, Json(map_view(view))))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExpenseView>, ServerError> {
    let view = state.engine.expense(id, &user.username).await?;
    Ok(Json(map_view(view)))
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Query(query): Query<ExpenseListQuery>,
) -> Result<Json<ExpenseListResponse>, ServerError> {
    let filter = engine::ExpenseListFilter {
        submitted_by: query.submitted_by,
        status: query.status.map(status_from_api),
        zoho_entity: query.zoho_entity,
        event_id: query.event_id,
        from: query.from,
        to: query.to,
        pushed: query.pushed,
    };
    let views = state.engine.list_expenses(&user.username, &filter).await?;
    Ok(Json(ExpenseListResponse {
        items: views.into_iter().map(map_view).collect(),
    }))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExpenseUpdate>,
) -> Result<Json<ExpenseView>, ServerError> {
    let mut cmd = engine::UpdateExpenseCmd::new(id, &user.username);
    if let Some(amount) = payload.amount.as_deref() {
        cmd = cmd.amount_minor(parse_amount(amount)?);
    }
    if let Some(category) = payload.category {
        cmd = cmd.category(category);
    }
    if let Some(merchant) = payload.merchant {
        cmd = cmd.merchant(merchant);
    }
    if let Some(date) = payload.date {
        cmd = cmd.date(date);
    }
    if let Some(card) = payload.card_used {
        cmd = cmd.card_used(card);
    }
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    if let Some(location) = payload.location {
        cmd = cmd.location(location);
    }
    if let Some(event_id) = payload.event_id {
        cmd = cmd.event_id(event_id);
    }
    if let Some(required) = payload.reimbursement_required {
        cmd = cmd.reimbursement_required(required);
    }
    if let Some(status) = payload.status {
        cmd = cmd.status(status_from_api(status));
    }
    if let Some(status) = payload.reimbursement_status {
        cmd = cmd.reimbursement_status(reimbursement_from_api(status));
    }
    if let Some(entity) = payload.zoho_entity {
        cmd = cmd.zoho_entity(entity);
    }

    let view = state.engine.update_expense(cmd).await?;
    Ok(Json(map_view(view)))
}
