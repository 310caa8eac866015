use api_types::audit::{AuditEntry, AuditTrail, FieldChange};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};

pub async fn trail(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditTrail>, ServerError> {
    let entries = state.engine.audit_trail(id, &user.username).await?;
    let entries = entries
        .into_iter()
        .map(|entry| AuditEntry {
            seq: entry.seq,
            acting_user_id: entry.acting_user_id,
            action: entry.action.as_str().to_string(),
            changes: entry
                .changes
                .iter()
                .map(|(field, change)| {
                    (
                        field.to_string(),
                        FieldChange {
                            old: change.old.clone(),
                            new: change.new.clone(),
                        },
                    )
                })
                .collect(),
            timestamp: entry.timestamp,
        })
        .collect();
    Ok(Json(AuditTrail {
        expense_id: id,
        entries,
    }))
}
