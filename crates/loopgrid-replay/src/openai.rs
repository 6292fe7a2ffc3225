//! OpenAI-compatible chat completions backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::backend::{BackendOutput, ExecutionBackend};
use crate::error::BackendError;
use crate::overrides::user_message;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiBackend {
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
impl ExecutionBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn call(
        &self,
        model_name: &str,
        prompt_text: &str,
        input: &Value,
        timeout: Duration,
    ) -> Result<BackendOutput, BackendError> {
        let user = user_message(input);
        let mut messages = Vec::with_capacity(2);
        if !prompt_text.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: prompt_text,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &user,
        });

        let request = ChatCompletionRequest {
            model: if model_name.is_empty() {
                DEFAULT_MODEL
            } else {
                model_name
            },
            messages,
        };
        let url = format!("{}/chat/completions", self.base_url);

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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

        let completion: ChatCompletionResponse = response.json().await?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(BackendError::EmptyResponse)?;

        tracing::debug!(model = request.model, latency_ms, "OpenAI call completed");

        Ok(BackendOutput {
            output: json!({ "response": text }),
            latency_ms,
            tokens: completion.usage.map_or(0, |u| u.total_tokens),
        })
    }
}
