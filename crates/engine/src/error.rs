//! The module contains the error the engine can throw.
//!
//! Every variant belongs to one [`ErrorCategory`], the coarse class shown to
//! the caller. The variant itself is kept for logs and tests.
//!
//! - [`Forbidden`] the acting user's role does not allow the operation.
//! - [`InvalidTransition`] a review or reimbursement state rule was violated.
//! - [`NotConfigured`] the target entity has no ledger integration. This is a
//!   notice, not a failure.
//! - [`Transient`] the ledger could not be reached in time. Safe to retry.
//! - [`LedgerAuth`] the engine's own ledger credentials were rejected.
//!
//!  [`Forbidden`]: EngineError::Forbidden
//!  [`InvalidTransition`]: EngineError::InvalidTransition
//!  [`NotConfigured`]: EngineError::NotConfigured
//!  [`Transient`]: EngineError::Transient
//!  [`LedgerAuth`]: EngineError::LedgerAuth
use ledger::LedgerError;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("Ledger not configured for entity \"{0}\"")]
    NotConfigured(String),
    #[error("Ledger temporarily unavailable: {0}")]
    Transient(String),
    #[error("Ledger rejected the service credentials: {0}")]
    LedgerAuth(String),
    #[error("Ledger misconfigured: {0}")]
    LedgerMisconfigured(String),
    #[error("Concurrent modification of expense {0}")]
    VersionConflict(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// User-facing error class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    BlockedByPermission,
    BlockedByState,
    /// Informational only: the request was valid but the feature is not
    /// available for this target yet.
    Notice,
    TransientRetrySafe,
    SystemError,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlockedByPermission => "blocked_by_permission",
            Self::BlockedByState => "blocked_by_state",
            Self::Notice => "notice",
            Self::TransientRetrySafe => "transient_retry_safe",
            Self::SystemError => "system_error",
        }
    }
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Forbidden(_) => ErrorCategory::BlockedByPermission,
            Self::KeyNotFound(_)
            | Self::InvalidTransition(_)
            | Self::PreconditionFailed(_)
            | Self::InvalidInput(_) => ErrorCategory::BlockedByState,
            Self::NotConfigured(_) => ErrorCategory::Notice,
            Self::Transient(_) | Self::VersionConflict(_) => ErrorCategory::TransientRetrySafe,
            Self::LedgerAuth(_) | Self::LedgerMisconfigured(_) | Self::Database(_) => {
                ErrorCategory::SystemError
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::TransientRetrySafe
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotConfigured(entity) => Self::NotConfigured(entity),
            LedgerError::Transient(msg) => Self::Transient(msg),
            LedgerError::Auth(msg) => Self::LedgerAuth(msg),
            LedgerError::Misconfigured(msg) => Self::LedgerMisconfigured(msg),
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::InvalidTransition(a), Self::InvalidTransition(b)) => a == b,
            (Self::PreconditionFailed(a), Self::PreconditionFailed(b)) => a == b,
            (Self::NotConfigured(a), Self::NotConfigured(b)) => a == b,
            (Self::Transient(a), Self::Transient(b)) => a == b,
            (Self::LedgerAuth(a), Self::LedgerAuth(b)) => a == b,
            (Self::LedgerMisconfigured(a), Self::LedgerMisconfigured(b)) => a == b,
            (Self::VersionConflict(a), Self::VersionConflict(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_keep_their_class() {
        let cases = [
            (
                LedgerError::NotConfigured("beta".to_string()),
                ErrorCategory::Notice,
            ),
            (
                LedgerError::Transient("timeout".to_string()),
                ErrorCategory::TransientRetrySafe,
            ),
            (
                LedgerError::Auth("invalid_code".to_string()),
                ErrorCategory::SystemError,
            ),
            (
                LedgerError::Misconfigured("bad account".to_string()),
                ErrorCategory::SystemError,
            ),
        ];
        for (ledger_err, category) in cases {
            assert_eq!(EngineError::from(ledger_err).category(), category);
        }
    }

    #[test]
    fn auth_is_not_a_permission_problem() {
        let err = EngineError::LedgerAuth("expired".to_string());
        assert_ne!(err.category(), ErrorCategory::BlockedByPermission);
        assert!(!err.is_retryable());
    }

    #[test]
    fn state_errors_are_blocked_by_state() {
        assert_eq!(
            EngineError::InvalidTransition("x".to_string()).category(),
            ErrorCategory::BlockedByState
        );
        assert_eq!(
            EngineError::PreconditionFailed("x".to_string()).category(),
            ErrorCategory::BlockedByState
        );
        assert!(EngineError::VersionConflict("e1".to_string()).is_retryable());
    }
}
