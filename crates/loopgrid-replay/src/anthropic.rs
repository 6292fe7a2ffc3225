//! Anthropic messages backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::backend::{BackendOutput, ExecutionBackend};
use crate::error::BackendError;
use crate::overrides::user_message;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicBackend {
    pub fn new(api_key: &str, base_url: Option<&str>) -> Result<Self, BackendError> {
        Ok(Self {
            client: Client::builder().build()?,
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[async_trait]
impl ExecutionBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn call(
        &self,
        model_name: &str,
        prompt_text: &str,
        input: &Value,
        timeout: Duration,
    ) -> Result<BackendOutput, BackendError> {
        let user = user_message(input);
        let request = MessagesRequest {
            model: if model_name.is_empty() {
                DEFAULT_MODEL
            } else {
                model_name
            },
            max_tokens: MAX_TOKENS,
            system: if prompt_text.is_empty() {
                DEFAULT_SYSTEM_PROMPT
            } else {
                prompt_text
            },
            messages: [Message {
                role: "user",
                content: &user,
            }],
        };
        let url = format!("{}/v1/messages", self.base_url);

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .timeout(timeout)
            .json(&request)
            .send()
            .await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let reply: MessagesResponse = response.json().await?;
        let text = reply
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or(BackendError::EmptyResponse)?;

        tracing::debug!(model = request.model, latency_ms, "Anthropic call completed");

        Ok(BackendOutput {
            output: json!({ "response": text }),
            latency_ms,
            tokens: reply
                .usage
                .map_or(0, |u| u.input_tokens + u.output_tokens),
        })
    }
}
