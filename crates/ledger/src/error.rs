//! Failure modes of the external ledger.
//!
//! The variants are deliberately coarse: callers only need to know whether to
//! retry later ([`Transient`]), raise a system alert ([`Auth`]), fix the
//! account setup ([`Misconfigured`]) or tell the user the entity has no ledger
//! integration yet ([`NotConfigured`]).
//!
//!  [`Transient`]: LedgerError::Transient
//!  [`Auth`]: LedgerError::Auth
//!  [`Misconfigured`]: LedgerError::Misconfigured
//!  [`NotConfigured`]: LedgerError::NotConfigured
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger integration not configured for entity \"{0}\"")]
    NotConfigured(String),
    #[error("ledger temporarily unavailable: {0}")]
    Transient(String),
    #[error("ledger credentials rejected: {0}")]
    Auth(String),
    #[error("ledger rejected the request: {0}")]
    Misconfigured(String),
}

impl LedgerError {
    /// Returns `true` when the same call may succeed if issued again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify a non-success HTTP status returned by a ledger API.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::Auth(body)
        } else if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            Self::Transient(format!("{status}: {body}"))
        } else {
            Self::Misconfigured(format!("{status}: {body}"))
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status, err.to_string());
        }
        if err.is_decode() {
            return Self::Misconfigured(format!("unexpected response: {err}"));
        }
        if err.is_builder() {
            return Self::Misconfigured(err.to_string());
        }
        // timeouts, connect failures, broken bodies
        Self::Transient(err.to_string())
    }
}
