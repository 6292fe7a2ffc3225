//! Error types for the loopgrid-ledger crate.

use loopgrid_core::{CoreError, DecisionId, ReplayId};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Decision {0} not found")]
    DecisionNotFound(DecisionId),

    #[error("Replay {0} not found")]
    ReplayNotFound(ReplayId),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DecisionNotFound(_) | Self::ReplayNotFound(_))
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DecisionNotFound(id) => Self::DecisionNotFound(id),
            StoreError::ReplayNotFound(id) => Self::ReplayNotFound(id),
            other => Self::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
