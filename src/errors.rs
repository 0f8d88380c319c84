use thiserror::Error;
use uuid::Uuid;

use crate::types::LoanId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid argument: {message}")]
    InvalidArgument {
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: Uuid,
    },

    #[error("invalid state: current {current}, expected {expected}")]
    InvalidState {
        current: String,
        expected: String,
    },

    #[error("schedule already generated for loan {loan_id}")]
    AlreadyScheduled {
        loan_id: LoanId,
    },

    #[error("repository failure: {message}")]
    Repository {
        message: String,
    },

    #[error("loan {loan_id} exceeded its processing budget after {elapsed_ms} ms")]
    Timeout {
        loan_id: LoanId,
        elapsed_ms: u64,
    },
}

impl LedgerError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        LedgerError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_state(current: impl ToString, expected: impl Into<String>) -> Self {
        LedgerError::InvalidState {
            current: current.to_string(),
            expected: expected.into(),
        }
    }

    pub fn loan_not_found(id: LoanId) -> Self {
        LedgerError::NotFound { entity: "loan", id }
    }

    pub fn installment_not_found(id: Uuid) -> Self {
        LedgerError::NotFound {
            entity: "installment",
            id,
        }
    }

    /// only collaborator failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Repository { .. })
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
