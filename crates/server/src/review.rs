//! Review and reimbursement endpoints.

use api_types::expense::{BulkResponse, BulkStatus, ExpenseView, ReimbursementUpdate, StatusUpdate};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    ServerError,
    expenses::{map_bulk, map_view, reimbursement_from_api, status_from_api},
    server::ServerState,
    user,
};

pub async fn set_status(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdate>,
) -> Result<Json<ExpenseView>, ServerError> {
    let view = state
        .engine
        .set_status(id, status_from_api(payload.status), &user.username)
        .await?;
    Ok(Json(map_view(view)))
}

pub async fn set_reimbursement(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReimbursementUpdate>,
) -> Result<Json<ExpenseView>, ServerError> {
    let status = reimbursement_from_api(payload.reimbursement_status);
    let view = state
        .engine
        .set_reimbursement(id, status, &user.username)
        .await?;
    Ok(Json(map_view(view)))
}

pub async fn bulk_status(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<BulkStatus>,
) -> Result<Json<BulkResponse>, ServerError> {
    if payload.ids.is_empty() {
        return Err(ServerError::Generic("ids must not be empty".to_string()));
    }
    let outcome = state
        .engine
        .bulk_set_status(&payload.ids, status_from_api(payload.status), &user.username)
        .await;
    Ok(Json(map_bulk(outcome)))
}
