//! Live execution backends and the registry that selects them.
//!
//! A backend is registered only when its credential is configured, so
//! "is live execution possible for this provider" is a plain lookup made
//! before any call is attempted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loopgrid_core::ReplayConfig;
use serde_json::Value;

use crate::anthropic::AnthropicBackend;
use crate::error::BackendError;
use crate::openai::OpenAiBackend;

/// Result of a successful backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendOutput {
    /// Always `{"response": <text>}`.
    pub output: Value,
    pub latency_ms: u64,
    pub tokens: u64,
}

/// One model provider reachable over the network.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Canonical provider name recorded on live replays.
    fn name(&self) -> &'static str;

    async fn call(
        &self,
        model_name: &str,
        prompt_text: &str,
        input: &Value,
        timeout: Duration,
    ) -> Result<BackendOutput, BackendError>;
}

/// Provider name → backend, with aliases.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn ExecutionBackend>>,
    aliases: HashMap<String, String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every provider whose credential is present.
    pub fn from_config(config: &ReplayConfig) -> Result<Self, BackendError> {
        let mut registry = Self::new();

        if let Some(key) = config.openai.api_key.as_deref().filter(|_| config.openai.has_credentials()) {
            let backend = OpenAiBackend::new(key, config.openai.base_url.as_deref())?;
            registry.register("openai", Arc::new(backend));
        }
        if let Some(key) = config
            .anthropic
            .api_key
            .as_deref()
            .filter(|_| config.anthropic.has_credentials())
        {
            let backend = AnthropicBackend::new(key, config.anthropic.base_url.as_deref())?;
            registry.register("anthropic", Arc::new(backend));
        }
        registry.alias("claude", "anthropic");

        tracing::debug!(providers = ?registry.providers(), "Backend registry built");
        Ok(registry)
    }

    pub fn register(&mut self, provider: &str, backend: Arc<dyn ExecutionBackend>) {
        self.backends.insert(provider.to_lowercase(), backend);
    }

    pub fn alias(&mut self, alias: &str, provider: &str) {
        self.aliases
            .insert(alias.to_lowercase(), provider.to_lowercase());
    }

    /// Case-insensitive lookup, following one level of aliasing.
    pub fn get(&self, provider: &str) -> Option<Arc<dyn ExecutionBackend>> {
        let key = provider.to_lowercase();
        let key = self.aliases.get(&key).unwrap_or(&key);
        self.backends.get(key).cloned()
    }

    pub fn is_available(&self, provider: &str) -> bool {
        self.get(provider).is_some()
    }

    /// Registered provider names, sorted.
    pub fn providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
