//! # Engine Errors
//!
//! One error type for everything the engine reports to its callers. Each
//! variant carries a human-readable message; [`ErrorKind`] gives the stable,
//! machine-readable name that the HTTP layer maps onto status codes.
//!
//! Lower layers keep their own precise error enums ([`StoreError`],
//! [`LedgerError`], …) and convert into this one with `?`.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::storage::StoreError;

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable, machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Unauthorized,
    Forbidden,
    AlreadyExists,
    InvalidState,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Unauthorized => "UnauthorizedError",
            ErrorKind::Forbidden => "ForbiddenError",
            ErrorKind::AlreadyExists => "AlreadyExistsError",
            ErrorKind::InvalidState => "InvalidStateError",
            ErrorKind::Unavailable => "UnavailableError",
            ErrorKind::Internal => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that can go wrong inside the engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    InvalidState(String),

    /// The payment rail could not be reached in time.
    #[error("{0}")]
    Unavailable(String),

    /// Our own fault. The message may contain internals and must not be
    /// shown to end users outside development mode.
    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Unavailable(_) => ErrorKind::Unavailable,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::NotFound(m)
            | Error::Validation(m)
            | Error::Unauthorized(m)
            | Error::Forbidden(m)
            | Error::AlreadyExists(m)
            | Error::InvalidState(m)
            | Error::Unavailable(m)
            | Error::Internal(m) => m,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => Error::AlreadyExists(what),
            StoreError::NotFound(what) => Error::NotFound(what),
            other => Error::Internal(other.to_string()),
        }
    }
}

impl From<LedgerError> for Error {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Timeout(_) | LedgerError::Transport(_) | LedgerError::Rpc { .. } => {
                Error::Unavailable(format!("Payment network unavailable: {err}"))
            }
            LedgerError::Malformed(_) => Error::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn store_conflict_becomes_already_exists() {
        let err: Error = StoreError::Conflict("Username already taken".into()).into();
        assert_eq!(err, Error::AlreadyExists("Username already taken".into()));
        assert_eq!(err.kind().as_str(), "AlreadyExistsError");
    }

    #[test]
    fn store_codec_failure_is_internal() {
        let err: Error = StoreError::Serialization("bad bytes".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn ledger_timeout_is_unavailable() {
        let err: Error = LedgerError::Timeout(Duration::from_millis(10)).into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn malformed_payload_is_internal() {
        let err: Error = LedgerError::Malformed("missing meta".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn message_is_the_display_text() {
        let err = Error::validation("Insufficient payment amount");
        assert_eq!(err.message(), "Insufficient payment amount");
        assert_eq!(err.to_string(), "Insufficient payment amount");
    }
}
