//! Original vs. replay output comparison.

use loopgrid_core::{DecisionId, ExecutionMode, ReplayId};
use serde::Serialize;
use serde_json::Value;

/// `serde_json::Value` equality is structural, so key order never matters.
pub fn output_changed(original: &Value, replay: &Value) -> bool {
    original != replay
}

pub fn diff_summary(changed: bool, mode: ExecutionMode) -> Option<String> {
    changed.then(|| format!("Output changed after replay ({mode} execution)"))
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub decision_id: DecisionId,
    pub replay_id: ReplayId,
    pub original_output: Value,
    pub replay_output: Value,
    pub output_changed: bool,
    pub diff_summary: Option<String>,
}
