//! Configuration management for LoopGrid.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`LOOPGRID__` prefix, `__` separator)
//! 2. Config file (`loopgrid.toml` by default)
//! 3. Defaults
//!
//! Provider credentials additionally fall back to the conventional
//! `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` variables.

use serde::Deserialize;

use crate::error::CoreError;

/// Top-level LoopGrid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoopgridConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub replay: ReplayConfig,
}

/// Ledger storage and hashing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Directory holding decision and replay records.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Digest used for content and chain hashes.
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
}

/// 256-bit digest functions the ledger can chain with.
///
/// `Sha256` is hash-compatible with ledgers written by other LoopGrid
/// implementations; `Blake3` is faster but only verifiable here.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

/// Replay execution settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// Upper bound for a single live backend call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub openai: ProviderConfig,

    #[serde(default)]
    pub anthropic: ProviderConfig,
}

/// Endpoint and credential for one live execution backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    /// Overrides the backend's public endpoint (proxies, gateways, tests).
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Whether a non-empty credential is configured.
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

fn default_data_dir() -> String {
    "./loopgrid-data".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            hash_algorithm: HashAlgorithm::default(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            openai: ProviderConfig::default(),
            anthropic: ProviderConfig::default(),
        }
    }
}

impl LoopgridConfig {
    /// Load configuration from `{file_prefix}.toml` (optional) and the environment.
    pub fn load(file_prefix: &str) -> Result<Self, CoreError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("LOOPGRID")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: LoopgridConfig = cfg.try_deserialize()?;
        loaded.apply_credential_fallback(
            std::env::var("OPENAI_API_KEY").ok(),
            std::env::var("ANTHROPIC_API_KEY").ok(),
        );

        tracing::debug!(
            data_dir = %loaded.ledger.data_dir,
            hash_algorithm = ?loaded.ledger.hash_algorithm,
            openai = loaded.replay.openai.has_credentials(),
            anthropic = loaded.replay.anthropic.has_credentials(),
            "Configuration loaded"
        );

        Ok(loaded)
    }

    /// Fill missing provider keys from conventional environment values.
    pub fn apply_credential_fallback(
        &mut self,
        openai_key: Option<String>,
        anthropic_key: Option<String>,
    ) {
        if !self.replay.openai.has_credentials() {
            if let Some(key) = openai_key.filter(|k| !k.trim().is_empty()) {
                self.replay.openai.api_key = Some(key);
            }
        }
        if !self.replay.anthropic.has_credentials() {
            if let Some(key) = anthropic_key.filter(|k| !k.trim().is_empty()) {
                self.replay.anthropic.api_key = Some(key);
            }
        }
    }
}
