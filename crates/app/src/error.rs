//! Application-layer error taxonomy: domain rejections plus the few failure
//! modes the infrastructure can add on top.

use shopledger_core::DomainError;
use shopledger_events::JournalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("journal: {0}")]
    Journal(#[from] JournalError),

    #[error("lock poisoned")]
    Poisoned,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// The underlying domain rejection, when there is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            AppError::Domain(err) => Some(err),
            _ => None,
        }
    }
}
