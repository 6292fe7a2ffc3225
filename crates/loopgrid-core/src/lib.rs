//! loopgrid-core: Shared record types, configuration, and error handling for LoopGrid.
//!
//! This crate provides the foundational types used across all LoopGrid components:
//! - Decision records with their hash-chain fields and review side channels
//! - Replay records describing a re-execution of a past decision
//! - Configuration management
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{HashAlgorithm, LedgerConfig, LoopgridConfig, ProviderConfig, ReplayConfig};
pub use error::CoreError;
pub use types::{
    Correction, Decision, DecisionId, DecisionPayloads, DecisionStatus, ExecutionMode,
    ExecutionStatus, IncorrectFlag, Payload, Replay, ReplayId,
};
