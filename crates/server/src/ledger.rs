//! Ledger push and health endpoints.

use api_types::ledger::{AccountHealth, LedgerHealth, PushResponse};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::EngineError;
use uuid::Uuid;

use crate::{ServerError, expenses::map_view, not_configured_notice, server::ServerState, user};

/// Push one expense to the ledger of its entity.
///
/// An entity without ledger integration is not an error for the caller:
/// the answer is `202 Accepted` with the unchanged expense and a notice.
pub async fn push(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<PushResponse>), ServerError> {
    match state.engine.push_to_ledger(id, &user.username).await {
        Ok(outcome) => Ok((
            StatusCode::OK,
            Json(PushResponse {
                expense: map_view(outcome.view),
                external_id: Some(outcome.external_id),
                already_pushed: outcome.already_pushed,
                notice: None,
            }),
        )),
        Err(EngineError::NotConfigured(entity)) => {
            let view = state.engine.expense(id, &user.username).await?;
            Ok((
                StatusCode::ACCEPTED,
                Json(PushResponse {
                    expense: map_view(view),
                    external_id: None,
                    already_pushed: false,
                    notice: Some(not_configured_notice(&entity)),
                }),
            ))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn health(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<LedgerHealth>, ServerError> {
    let accounts = state.engine.ledger_health(&user.username).await?;
    let enabled_entities = state.engine.ledger_entities().await?;
    Ok(Json(LedgerHealth {
        enabled_entities: enabled_entities.into_iter().collect(),
        accounts: accounts
            .into_iter()
            .map(|a| AccountHealth {
                entity: a.entity,
                healthy: a.healthy,
                mock: a.mock,
                message: a.message,
            })
            .collect(),
    }))
}
