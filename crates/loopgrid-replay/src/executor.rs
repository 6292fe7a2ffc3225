//! Replay execution: merge overrides, dispatch live or simulate.

use std::time::Duration;

use loopgrid_core::ExecutionMode;
use serde_json::Value;

use crate::backend::BackendRegistry;
use crate::error::BackendError;
use crate::overrides::{EffectiveRequest, ReplayOverrides};
use crate::simulate::{self, simulate};

/// The recorded parts of a decision a replay starts from.
#[derive(Debug, Clone, Copy)]
pub struct OriginalDecision<'a> {
    pub input: &'a Value,
    pub model: &'a Value,
    pub prompt: Option<&'a Value>,
    pub output: &'a Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub output: Value,
    pub mode: ExecutionMode,
    pub latency_ms: u64,
    pub tokens: u64,
    pub provider: String,
    pub error: Option<String>,
}

pub struct ReplayExecutor {
    registry: BackendRegistry,
    timeout: Duration,
}

impl ReplayExecutor {
    pub fn new(registry: BackendRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Run one replay. Backend failures come back as [`ExecutionMode::Error`]
    /// outcomes carrying the original output; this never returns an error.
    pub async fn execute(
        &self,
        original: OriginalDecision<'_>,
        overrides: &ReplayOverrides,
    ) -> ExecutionOutcome {
        let request =
            EffectiveRequest::merge(original.input, original.model, original.prompt, overrides);
        let provider = request.provider();

        let Some(backend) = self.registry.get(&provider) else {
            let sim = simulate(original.output, overrides, &request.input);
            tracing::debug!(provider = %provider, "No live backend, simulating replay");
            return ExecutionOutcome {
                output: sim.output,
                mode: ExecutionMode::Simulated,
                latency_ms: sim.latency_ms,
                tokens: 0,
                provider: simulate::PROVIDER.to_string(),
                error: None,
            };
        };

        let call = backend.call(
            request.model_name(),
            request.prompt_text(),
            &request.input,
            self.timeout,
        );
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.timeout.as_millis() as u64)),
        };

        match result {
            Ok(out) => ExecutionOutcome {
                output: out.output,
                mode: ExecutionMode::Live,
                latency_ms: out.latency_ms,
                tokens: out.tokens,
                provider: backend.name().to_string(),
                error: None,
            },
            Err(err) => {
                tracing::warn!(provider = %provider, error = %err, "Live replay failed");
                ExecutionOutcome {
                    output: original.output.clone(),
                    mode: ExecutionMode::Error,
                    latency_ms: 0,
                    tokens: 0,
                    provider,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}
