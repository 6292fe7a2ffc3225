//! Core record types for the LoopGrid decision ledger.
//!
//! A [`Decision`] is the immutable record of one AI service decision plus its
//! hash-chain fields. A [`Replay`] is a re-execution of a past decision; it
//! references its decision by id and is never part of the hash chain.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;

/// Default attribution for replays created without a `triggered_by`.
pub const DEFAULT_TRIGGERED_BY: &str = "system";

fn short_hex() -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(12);
    hex
}

// ── Identifiers ───────────────────────────────────────────────────

/// Unique identifier for a decision (`dec_` + 12 hex chars).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct DecisionId(pub String);

impl DecisionId {
    pub fn new() -> Self {
        Self(format!("dec_{}", short_hex()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DecisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DecisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DecisionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a replay (`rep_` + 12 hex chars).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ReplayId(pub String);

impl ReplayId {
    pub fn new() -> Self {
        Self(format!("rep_{}", short_hex()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReplayId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReplayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReplayId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── Payloads ──────────────────────────────────────────────────────

/// A structured payload kept in its serialized JSON form.
///
/// Decisions persist their payloads as text so that a damaged record can
/// still be loaded and reported by the chain verifier instead of failing
/// the whole read. A stored payload that is not a string (hand-edited into a
/// bare object, say) is kept as its serialized text.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Payload(String);

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(raw) => Self(raw),
            other => Self(other.to_string()),
        })
    }
}

impl Payload {
    pub fn from_value(value: &Value) -> Self {
        Self(value.to_string())
    }

    /// Wrap already-serialized text without validating it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn raw(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.0)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

// ── Decision ──────────────────────────────────────────────────────

/// Review status of a decision. Changing it never touches the hashes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    #[default]
    Recorded,
    Incorrect,
    Corrected,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recorded => "recorded",
            Self::Incorrect => "incorrect",
            Self::Corrected => "corrected",
        }
    }
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recorded" => Ok(Self::Recorded),
            "incorrect" => Ok(Self::Incorrect),
            "corrected" => Ok(Self::Corrected),
            _ => Err(CoreError::InvalidValue {
                kind: "decision status",
                value: s.to_string(),
            }),
        }
    }
}

/// Set when a decision is flagged as incorrect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncorrectFlag {
    pub reason: Option<String>,
    pub flagged_at: DateTime<Utc>,
}

/// A human-supplied corrected output attached to a decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Correction {
    pub output: Value,
    pub corrected_by: String,
    pub corrected_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// The immutable record of one AI decision in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub id: DecisionId,
    /// Position in the ledger, starting at 1. Breaks `created_at` ties.
    pub sequence: u64,
    pub created_at: DateTime<Utc>,

    pub service_name: String,
    pub decision_type: String,

    pub input: Payload,
    pub model: Payload,
    pub output: Payload,
    #[serde(default)]
    pub prompt: Option<Payload>,
    #[serde(default)]
    pub tool_calls: Option<Payload>,
    #[serde(default)]
    pub metadata: Option<Payload>,

    /// Digest of the semantic fields (hex). Write-once.
    pub content_hash: String,
    /// Digest binding `content_hash` to the predecessor's chain hash. Write-once.
    pub chain_hash: String,

    #[serde(default)]
    pub status: DecisionStatus,
    #[serde(default)]
    pub incorrect: Option<IncorrectFlag>,
    #[serde(default)]
    pub correction: Option<Correction>,
}

/// Decoded payloads of a decision.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPayloads {
    pub input: Value,
    pub model: Value,
    pub output: Value,
    pub prompt: Option<Value>,
    pub tool_calls: Option<Value>,
    pub metadata: Option<Value>,
}

impl Decision {
    /// Decode every stored payload, failing on the first one that is not JSON.
    pub fn payloads(&self) -> Result<DecisionPayloads, CoreError> {
        let decode = |field: &'static str, payload: &Payload| {
            payload.decode().map_err(|source| CoreError::CorruptPayload {
                decision_id: self.id.clone(),
                field,
                source,
            })
        };
        let decode_opt = |field: &'static str, payload: &Option<Payload>| {
            payload.as_ref().map(|p| decode(field, p)).transpose()
        };

        Ok(DecisionPayloads {
            input: decode("input", &self.input)?,
            model: decode("model", &self.model)?,
            output: decode("output", &self.output)?,
            prompt: decode_opt("prompt", &self.prompt)?,
            tool_calls: decode_opt("tool_calls", &self.tool_calls)?,
            metadata: decode_opt("metadata", &self.metadata)?,
        })
    }
}

// ── Replay ────────────────────────────────────────────────────────

/// How a replay was executed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Live,
    Simulated,
    Error,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Simulated => "simulated",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

impl From<ExecutionMode> for ExecutionStatus {
    fn from(mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::Error => Self::Failed,
            ExecutionMode::Live | ExecutionMode::Simulated => Self::Completed,
        }
    }
}

/// A re-execution of a past decision. Append-only, never chained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Replay {
    pub id: ReplayId,
    pub created_at: DateTime<Utc>,
    pub decision_id: DecisionId,
    pub overrides: Option<Value>,
    pub triggered_by: String,
    pub replay_output: Value,
    pub execution_status: ExecutionStatus,
    pub execution_mode: ExecutionMode,
    pub execution_latency_ms: u64,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub error: Option<String>,
    pub output_changed: bool,
    pub diff_summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_decision() -> Decision {
        Decision {
            id: DecisionId::new(),
            sequence: 1,
            created_at: Utc::now(),
            service_name: "support-agent".to_string(),
            decision_type: "customer_support_reply".to_string(),
            input: json!({"message": "I was charged twice"}).into(),
            model: json!({"provider": "openai", "name": "gpt-4"}).into(),
            output: json!({"response": "Your account looks fine."}).into(),
            prompt: Some(json!({"template": "support_v1"}).into()),
            tool_calls: None,
            metadata: None,
            content_hash: String::new(),
            chain_hash: String::new(),
            status: DecisionStatus::Recorded,
            incorrect: None,
            correction: None,
        }
    }

    #[test]
    fn ids_carry_prefix_and_length() {
        let dec = DecisionId::new();
        let rep = ReplayId::new();
        assert!(dec.as_str().starts_with("dec_"));
        assert_eq!(dec.as_str().len(), 16);
        assert!(rep.as_str().starts_with("rep_"));
        assert_ne!(DecisionId::new(), dec);
    }

    #[test]
    fn payloads_decode() {
        let decision = sample_decision();
        let payloads = decision.payloads().unwrap();
        assert_eq!(payloads.input["message"], "I was charged twice");
        assert_eq!(payloads.prompt, Some(json!({"template": "support_v1"})));
        assert_eq!(payloads.metadata, None);
    }

    #[test]
    fn corrupt_payload_names_field() {
        let mut decision = sample_decision();
        decision.output = Payload::from_raw("{not json");
        let err = decision.payloads().unwrap_err();
        assert!(matches!(
            err,
            CoreError::CorruptPayload { field: "output", .. }
        ));
    }

    #[test]
    fn non_string_payload_loads_as_text() {
        let mut doc = serde_json::to_value(sample_decision()).unwrap();
        doc["output"] = json!({"response": "X"});
        doc["metadata"] = json!(42);

        let loaded: Decision = serde_json::from_value(doc).unwrap();
        assert_eq!(loaded.output.raw(), r#"{"response":"X"}"#);
        assert_eq!(loaded.output.decode().unwrap(), json!({"response": "X"}));
        assert_eq!(loaded.metadata.map(|m| m.raw().to_string()).as_deref(), Some("42"));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            "Corrected".parse::<DecisionStatus>().unwrap(),
            DecisionStatus::Corrected
        );
        assert!("deleted".parse::<DecisionStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&DecisionStatus::Incorrect).unwrap(),
            "\"incorrect\""
        );
    }

    #[test]
    fn error_mode_marks_replay_failed() {
        assert_eq!(
            ExecutionStatus::from(ExecutionMode::Error),
            ExecutionStatus::Failed
        );
        assert_eq!(
            ExecutionStatus::from(ExecutionMode::Simulated),
            ExecutionStatus::Completed
        );
    }

    #[test]
    fn decision_serialization_roundtrip() {
        let decision = sample_decision();
        let json = serde_json::to_string(&decision).unwrap();
        let back: Decision = serde_json::from_str(&json).unwrap();
        assert_eq!(decision, back);
    }
}
