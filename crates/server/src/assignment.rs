//! Entity assignment endpoints.

use api_types::expense::{BulkEntity, BulkResponse, EntityUpdate, ExpenseView};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    ServerError,
    expenses::{map_bulk, map_view},
    server::ServerState,
    user,
};

pub async fn assign(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EntityUpdate>,
) -> Result<Json<ExpenseView>, ServerError> {
    let entity = payload.zoho_entity.unwrap_or_default();
    let view = state
        .engine
        .assign_entity(id, &entity, &user.username)
        .await?;
    Ok(Json(map_view(view)))
}

pub async fn bulk_assign(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<BulkEntity>,
) -> Result<Json<BulkResponse>, ServerError> {
    if payload.ids.is_empty() {
        return Err(ServerError::Generic("ids must not be empty".to_string()));
    }
    let entity = payload.zoho_entity.unwrap_or_default();
    let outcome = state
        .engine
        .bulk_assign_entity(&payload.ids, &entity, &user.username)
        .await;
    Ok(Json(map_bulk(outcome)))
}
