use api_types::ErrorBody;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::{EngineError, ErrorCategory};

pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};

mod assignment;
mod audit;
mod expenses;
mod ledger;
mod review;
mod server;
mod user;

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidTransition(_)
        | EngineError::PreconditionFailed(_)
        | EngineError::VersionConflict(_) => StatusCode::CONFLICT,
        EngineError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::NotConfigured(_) => StatusCode::ACCEPTED,
        EngineError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::LedgerAuth(_)
        | EngineError::LedgerMisconfigured(_)
        | EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::LedgerAuth(msg) | EngineError::LedgerMisconfigured(msg) => {
            tracing::error!("ledger integration error: {msg}");
            "ledger integration unavailable, an administrator has been notified".to_string()
        }
        EngineError::NotConfigured(entity) => not_configured_notice(&entity),
        other => other.to_string(),
    }
}

pub(crate) fn not_configured_notice(entity: &str) -> String {
    format!("ledger sync for entity \"{entity}\" is coming soon")
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, category, error) = match self {
            ServerError::Engine(err) => (
                status_for_engine_error(&err),
                err.category(),
                message_for_engine_error(err),
            ),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, ErrorCategory::BlockedByState, err),
        };

        let body = ErrorBody {
            error,
            category: category.as_str().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_forbidden_maps_to_403() {
        let res = ServerError::from(EngineError::Forbidden("forbidden".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::KeyNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn state_rules_map_to_409() {
        let res = ServerError::from(EngineError::InvalidTransition("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let res = ServerError::from(EngineError::PreconditionFailed("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn engine_validation_maps_to_422() {
        let res = ServerError::from(EngineError::InvalidInput("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn transient_maps_to_503() {
        let res = ServerError::from(EngineError::Transient("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn ledger_auth_is_a_server_fault() {
        let res = ServerError::from(EngineError::LedgerAuth("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
