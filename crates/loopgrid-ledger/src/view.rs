//! Outward JSON shape of ledger records.
//!
//! Payloads are decoded back into JSON. A payload that no longer decodes is
//! shown as its raw stored text so a tampered record stays inspectable.

use chrono::{DateTime, Utc};
use loopgrid_core::{
    Correction, Decision, DecisionId, DecisionStatus, ExecutionMode, ExecutionStatus, Payload,
    Replay, ReplayId,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct DecisionView {
    pub decision_id: DecisionId,
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub service_name: String,
    pub decision_type: String,
    pub input: Value,
    pub model: Value,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub status: DecisionStatus,
    pub content_hash: String,
    pub chain_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incorrect_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incorrect_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<Correction>,
}

fn decoded(payload: &Payload) -> Value {
    payload
        .decode()
        .unwrap_or_else(|_| Value::String(payload.raw().to_string()))
}

/// Null optional payloads are omitted like absent ones.
fn decoded_optional(payload: Option<&Payload>) -> Option<Value> {
    payload.map(decoded).filter(|v| !v.is_null())
}

impl From<&Decision> for DecisionView {
    fn from(d: &Decision) -> Self {
        Self {
            decision_id: d.id.clone(),
            sequence: d.sequence,
            created_at: d.created_at,
            service_name: d.service_name.clone(),
            decision_type: d.decision_type.clone(),
            input: decoded(&d.input),
            model: decoded(&d.model),
            output: decoded(&d.output),
            prompt: decoded_optional(d.prompt.as_ref()),
            tool_calls: decoded_optional(d.tool_calls.as_ref()),
            metadata: decoded_optional(d.metadata.as_ref()),
            status: d.status,
            content_hash: d.content_hash.clone(),
            chain_hash: d.chain_hash.clone(),
            incorrect_reason: d.incorrect.as_ref().and_then(|f| f.reason.clone()),
            incorrect_at: d.incorrect.as_ref().map(|f| f.flagged_at),
            correction: d.correction.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayView {
    pub replay_id: ReplayId,
    pub decision_id: DecisionId,
    pub created_at: DateTime<Utc>,
    pub triggered_by: String,
    pub overrides: Option<Value>,
    pub replay_output: Value,
    pub execution_status: ExecutionStatus,
    pub execution_mode: ExecutionMode,
    pub execution_latency_ms: u64,
    pub tokens: u64,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub output_changed: bool,
    pub diff_summary: Option<String>,
}

impl From<&Replay> for ReplayView {
    fn from(r: &Replay) -> Self {
        Self {
            replay_id: r.id.clone(),
            decision_id: r.decision_id.clone(),
            created_at: r.created_at,
            triggered_by: r.triggered_by.clone(),
            overrides: r.overrides.clone(),
            replay_output: r.replay_output.clone(),
            execution_status: r.execution_status,
            execution_mode: r.execution_mode,
            execution_latency_ms: r.execution_latency_ms,
            tokens: r.tokens,
            provider: r.provider.clone(),
            error: r.error.clone(),
            output_changed: r.output_changed,
            diff_summary: r.diff_summary.clone(),
        }
    }
}
