use thiserror::Error;

use crate::types::DecisionId;

/// Top-level error type shared by LoopGrid crates.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stored `{field}` payload of decision {decision_id} is not valid JSON: {source}")]
    CorruptPayload {
        decision_id: DecisionId,
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid {kind}: {value}")]
    InvalidValue { kind: &'static str, value: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
