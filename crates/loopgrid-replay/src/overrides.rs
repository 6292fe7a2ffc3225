//! Replay overrides and the effective request they produce.

use serde_json::{Map, Value};

use crate::error::{ReplayError, Result};

/// Caller-supplied replacements for parts of a recorded decision.
///
/// `input` replaces the original input wholesale; `model` and `prompt` are
/// shallow-merged over the originals. Other keys are kept in the stored
/// replay record but otherwise ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayOverrides {
    pub input: Option<Value>,
    pub model: Option<Map<String, Value>>,
    pub prompt: Option<Map<String, Value>>,
}

impl ReplayOverrides {
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(obj) => obj,
            _ => {
                return Err(ReplayError::InvalidOverrides(
                    "overrides must be a JSON object".into(),
                ))
            }
        };

        Ok(Self {
            input: obj.get("input").cloned(),
            model: object_field(obj, "model")?,
            prompt: object_field(obj, "prompt")?,
        })
    }

    /// Template named by the prompt override, if any.
    pub fn prompt_template(&self) -> Option<&str> {
        self.prompt.as_ref()?.get("template")?.as_str()
    }
}

fn object_field(obj: &Map<String, Value>, key: &str) -> Result<Option<Map<String, Value>>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(m)) => Ok(Some(m.clone())),
        Some(_) => Err(ReplayError::InvalidOverrides(format!(
            "{key} override must be a JSON object"
        ))),
    }
}

fn shallow_merge(base: Option<&Value>, over: Option<&Map<String, Value>>) -> Map<String, Value> {
    let mut merged = match base {
        Some(Value::Object(m)) => m.clone(),
        _ => Map::new(),
    };
    if let Some(over) = over {
        for (k, v) in over {
            merged.insert(k.clone(), v.clone());
        }
    }
    merged
}

/// What a replay actually runs with after overrides are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveRequest {
    pub input: Value,
    pub model: Map<String, Value>,
    pub prompt: Map<String, Value>,
}

impl EffectiveRequest {
    pub fn merge(
        original_input: &Value,
        original_model: &Value,
        original_prompt: Option<&Value>,
        overrides: &ReplayOverrides,
    ) -> Self {
        Self {
            input: overrides
                .input
                .clone()
                .unwrap_or_else(|| original_input.clone()),
            model: shallow_merge(Some(original_model), overrides.model.as_ref()),
            prompt: shallow_merge(original_prompt, overrides.prompt.as_ref()),
        }
    }

    fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
        map.get(key).and_then(Value::as_str)
    }

    /// Lowercased provider name, empty when unset.
    pub fn provider(&self) -> String {
        Self::str_field(&self.model, "provider")
            .unwrap_or_default()
            .to_lowercase()
    }

    pub fn model_name(&self) -> &str {
        Self::str_field(&self.model, "name").unwrap_or_default()
    }

    /// Prompt `text`, else `template`, else empty.
    pub fn prompt_text(&self) -> &str {
        Self::str_field(&self.prompt, "text")
            .or_else(|| Self::str_field(&self.prompt, "template"))
            .unwrap_or_default()
    }
}

/// The user turn sent to a backend: `input.message` when it is a non-empty
/// string, else the whole input as JSON.
pub fn user_message(input: &Value) -> String {
    match input.get("message").and_then(Value::as_str) {
        Some(msg) if !msg.is_empty() => msg.to_string(),
        _ => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_overrides_keeps_originals() {
        let req = EffectiveRequest::merge(
            &json!({"message": "hi"}),
            &json!({"provider": "OpenAI", "name": "gpt-4"}),
            Some(&json!({"template": "support_v1"})),
            &ReplayOverrides::default(),
        );
        assert_eq!(req.input, json!({"message": "hi"}));
        assert_eq!(req.provider(), "openai");
        assert_eq!(req.model_name(), "gpt-4");
        assert_eq!(req.prompt_text(), "support_v1");
    }

    #[test]
    fn model_and_prompt_merge_shallowly() {
        let overrides = ReplayOverrides::from_value(&json!({
            "model": {"name": "gpt-4o"},
            "prompt": {"text": "Be concise."}
        }))
        .unwrap();
        let req = EffectiveRequest::merge(
            &json!({"message": "hi"}),
            &json!({"provider": "openai", "name": "gpt-4", "version": "2024-01"}),
            Some(&json!({"template": "support_v1"})),
            &overrides,
        );
        assert_eq!(req.model_name(), "gpt-4o");
        assert_eq!(req.model["version"], "2024-01");
        assert_eq!(req.prompt_text(), "Be concise.");
        assert_eq!(req.prompt["template"], "support_v1");
    }

    #[test]
    fn input_override_replaces_wholesale() {
        let overrides =
            ReplayOverrides::from_value(&json!({"input": {"text": "new"}})).unwrap();
        let req = EffectiveRequest::merge(
            &json!({"message": "old", "account": 7}),
            &json!({}),
            None,
            &overrides,
        );
        assert_eq!(req.input, json!({"text": "new"}));
        assert_eq!(req.provider(), "");
        assert_eq!(req.prompt_text(), "");
    }

    #[test]
    fn rejects_malformed_overrides() {
        assert!(ReplayOverrides::from_value(&json!("v2")).is_err());
        assert!(ReplayOverrides::from_value(&json!({"model": "gpt-4"})).is_err());
        assert_eq!(
            ReplayOverrides::from_value(&Value::Null).unwrap(),
            ReplayOverrides::default()
        );
    }

    #[test]
    fn user_message_prefers_message_field() {
        assert_eq!(user_message(&json!({"message": "refund?"})), "refund?");
        let fallback = user_message(&json!({"message": "", "id": 1}));
        assert_eq!(
            serde_json::from_str::<Value>(&fallback).unwrap(),
            json!({"message": "", "id": 1})
        );
    }
}
