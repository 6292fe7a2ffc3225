//! Replay engine: reads a decision, executes, compares, and persists.
//!
//! Replays are stored next to decisions but never touch the hash chain, so
//! creating one does not take the ledger's append lock.

use std::sync::Arc;

use chrono::Utc;
use loopgrid_core::types::DEFAULT_TRIGGERED_BY;
use loopgrid_core::{DecisionId, ExecutionStatus, Replay, ReplayId};
use loopgrid_ledger::Ledger;
use serde_json::Value;

use crate::compare::{diff_summary, output_changed, ComparisonReport};
use crate::error::{ReplayError, Result};
use crate::executor::{OriginalDecision, ReplayExecutor};
use crate::overrides::ReplayOverrides;

pub struct ReplayEngine {
    ledger: Arc<Ledger>,
    executor: ReplayExecutor,
}

impl ReplayEngine {
    pub fn new(ledger: Arc<Ledger>, executor: ReplayExecutor) -> Self {
        Self { ledger, executor }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Re-execute a decision under optional overrides and record the result.
    ///
    /// Backend failures do not fail this call; they produce a replay with
    /// `execution_status = failed`.
    pub async fn create_replay(
        &self,
        decision_id: &DecisionId,
        overrides: Option<Value>,
        triggered_by: Option<&str>,
    ) -> Result<Replay> {
        let decision = self.ledger.get(decision_id)?;
        let payloads = decision.payloads()?;

        let parsed = overrides
            .as_ref()
            .map(ReplayOverrides::from_value)
            .transpose()?
            .unwrap_or_default();

        let outcome = self
            .executor
            .execute(
                OriginalDecision {
                    input: &payloads.input,
                    model: &payloads.model,
                    prompt: payloads.prompt.as_ref(),
                    output: &payloads.output,
                },
                &parsed,
            )
            .await;

        let changed = output_changed(&payloads.output, &outcome.output);
        let replay = Replay {
            id: ReplayId::new(),
            created_at: Utc::now(),
            decision_id: decision.id.clone(),
            overrides: overrides.filter(|v| !is_empty_overrides(v)),
            triggered_by: triggered_by
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(DEFAULT_TRIGGERED_BY)
                .to_string(),
            replay_output: outcome.output,
            execution_status: ExecutionStatus::from(outcome.mode),
            execution_mode: outcome.mode,
            execution_latency_ms: outcome.latency_ms,
            tokens: outcome.tokens,
            provider: outcome.provider,
            error: outcome.error,
            output_changed: changed,
            diff_summary: diff_summary(changed, outcome.mode),
        };

        self.ledger.append_replay(&replay)?;

        tracing::info!(
            replay_id = %replay.id,
            decision_id = %replay.decision_id,
            mode = %replay.execution_mode,
            provider = %replay.provider,
            output_changed = replay.output_changed,
            "Replay recorded"
        );

        Ok(replay)
    }

    pub fn get_replay(&self, id: &ReplayId) -> Result<Replay> {
        Ok(self.ledger.get_replay(id)?)
    }

    pub fn list_replays(&self, decision_id: &DecisionId) -> Result<Vec<Replay>> {
        Ok(self.ledger.list_replays(decision_id)?)
    }

    /// Side-by-side view of a decision's output and one of its replays.
    pub fn compare(&self, decision_id: &DecisionId, replay_id: &ReplayId) -> Result<ComparisonReport> {
        let decision = self.ledger.get(decision_id)?;
        let replay = self.ledger.get_replay(replay_id)?;
        if replay.decision_id != decision.id {
            return Err(ReplayError::ReplayMismatch {
                replay_id: replay.id,
                expected: decision.id,
                actual: replay.decision_id,
            });
        }

        let original_output = decision.payloads()?.output;
        let changed = output_changed(&original_output, &replay.replay_output);
        Ok(ComparisonReport {
            decision_id: decision.id,
            replay_id: replay.id,
            original_output,
            diff_summary: diff_summary(changed, replay.execution_mode),
            replay_output: replay.replay_output,
            output_changed: changed,
        })
    }
}

fn is_empty_overrides(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        _ => false,
    }
}
