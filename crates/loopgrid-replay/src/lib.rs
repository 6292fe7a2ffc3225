//! LoopGrid Replay: re-execute recorded decisions.
//!
//! A replay merges caller overrides over a decision's recorded input, model
//! and prompt, then runs it against a live provider when one is configured
//! for the effective model, or against a deterministic simulation when not.
//! The result is compared with the original output and stored as an
//! independent record.

pub mod anthropic;
pub mod backend;
pub mod compare;
pub mod engine;
pub mod error;
pub mod executor;
pub mod openai;
pub mod overrides;
pub mod simulate;

pub use anthropic::AnthropicBackend;
pub use backend::{BackendOutput, BackendRegistry, ExecutionBackend};
pub use compare::ComparisonReport;
pub use engine::ReplayEngine;
pub use error::{BackendError, ReplayError, Result};
pub use executor::{ExecutionOutcome, OriginalDecision, ReplayExecutor};
pub use openai::OpenAiBackend;
pub use overrides::{EffectiveRequest, ReplayOverrides};
