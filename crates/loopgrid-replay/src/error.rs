//! Error types for the loopgrid-replay crate.

use loopgrid_core::{CoreError, DecisionId, ReplayId};
use loopgrid_ledger::LedgerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid overrides: {0}")]
    InvalidOverrides(String),

    #[error("Replay {replay_id} belongs to decision {actual}, not {expected}")]
    ReplayMismatch {
        replay_id: ReplayId,
        expected: DecisionId,
        actual: DecisionId,
    },
}

impl ReplayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Ledger(e) if e.is_not_found())
    }
}

/// Failure of one live backend call. Captured into the replay record.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider error: HTTP {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Empty response")]
    EmptyResponse,

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, ReplayError>;
