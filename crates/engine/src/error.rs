//! The module contains the error the engine can throw.
//!
//! The taxonomy matters to callers: [`InvalidCode`] is retryable (ask the
//! user for the code again), [`Forbidden`] is not, [`KeyNotFound`] means the
//! target does not exist, and [`Mail`] is kept distinct from [`Database`] so
//! a failed verification mail can be retried without re-registering.
//!
//!  [`InvalidCode`]: EngineError::InvalidCode
//!  [`Forbidden`]: EngineError::Forbidden
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Mail`]: EngineError::Mail
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid verification code: {0}")]
    InvalidCode(String),
    #[error("Stale revision: {0}")]
    RevisionMismatch(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Mail delivery failed: {0}")]
    Mail(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::InvalidCode(a), Self::InvalidCode(b)) => a == b,
            (Self::RevisionMismatch(a), Self::RevisionMismatch(b)) => a == b,
            (Self::InvalidValue(a), Self::InvalidValue(b)) => a == b,
            (Self::Mail(a), Self::Mail(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
