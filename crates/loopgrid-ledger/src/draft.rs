//! Builder for decisions that have not been appended yet.
//!
//! ```no_run
//! # use loopgrid_ledger::draft::DecisionDraft;
//! let draft = DecisionDraft::new("support-agent", "customer_support_reply")
//!     .with_input(serde_json::json!({"message": "I was charged twice"}))
//!     .with_model(serde_json::json!({"provider": "openai", "name": "gpt-4"}))
//!     .with_prompt(serde_json::json!({"template": "support_v1"}))
//!     .with_output(serde_json::json!({"response": "Your account looks fine."}));
//! assert!(draft.validate().is_ok());
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{LedgerError, Result};

/// A decision as submitted by a service, before hashing and chaining.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DecisionDraft {
    pub service_name: String,
    pub decision_type: String,
    pub input: Value,
    pub model: Value,
    pub output: Value,
    #[serde(default)]
    pub prompt: Option<Value>,
    #[serde(default)]
    pub tool_calls: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl DecisionDraft {
    /// Start a draft with empty input, model, and output objects.
    pub fn new(service_name: &str, decision_type: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            decision_type: decision_type.to_string(),
            input: Value::Object(Map::new()),
            model: Value::Object(Map::new()),
            output: Value::Object(Map::new()),
            prompt: None,
            tool_calls: None,
            metadata: None,
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    pub fn with_model(mut self, model: Value) -> Self {
        self.model = model;
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = output;
        self
    }

    pub fn with_prompt(mut self, prompt: Value) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Value) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check the shape a ledger entry must have.
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(LedgerError::Validation("service_name must not be empty".into()));
        }
        if self.decision_type.trim().is_empty() {
            return Err(LedgerError::Validation("decision_type must not be empty".into()));
        }
        for (field, value) in [
            ("input", &self.input),
            ("model", &self.model),
            ("output", &self.output),
        ] {
            if !value.is_object() {
                return Err(LedgerError::Validation(format!(
                    "{field} must be a JSON object"
                )));
            }
        }
        for (field, value) in [("prompt", &self.prompt), ("metadata", &self.metadata)] {
            if let Some(v) = value {
                if !(v.is_object() || v.is_null()) {
                    return Err(LedgerError::Validation(format!(
                        "{field} must be a JSON object"
                    )));
                }
            }
        }
        if let Some(v) = &self.tool_calls {
            if !(v.is_array() || v.is_null()) {
                return Err(LedgerError::Validation(
                    "tool_calls must be a JSON array".into(),
                ));
            }
        }
        Ok(())
    }
}
