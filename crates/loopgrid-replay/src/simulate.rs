//! Deterministic stand-in used when no live backend can serve a replay.
//!
//! The rules only react to a prompt override whose template looks like a
//! newer revision. A pure function of its inputs; it never fails.

use serde_json::{json, Value};

use crate::overrides::ReplayOverrides;

pub const PROVIDER: &str = "simulation";

const REVISION_MARKERS: [&str; 2] = ["v2", "improved"];
const BILLING_KEYWORDS: [&str; 4] = ["charged twice", "double charge", "duplicate", "billing"];
const REFUND_REPLY: &str = "I can see there's a duplicate charge on your account. \
I've initiated a refund which will appear in 3-5 business days. \
Is there anything else I can help with?";

#[derive(Debug, Clone, PartialEq)]
pub struct Simulated {
    pub output: Value,
    pub latency_ms: u64,
}

pub fn simulate(
    original_output: &Value,
    overrides: &ReplayOverrides,
    effective_input: &Value,
) -> Simulated {
    let unchanged = Simulated {
        output: original_output.clone(),
        latency_ms: 0,
    };

    if overrides.prompt.is_none() {
        return unchanged;
    }
    let template = overrides.prompt_template().unwrap_or_default();
    if !REVISION_MARKERS.iter().any(|m| template.contains(m)) {
        return unchanged;
    }

    let haystack = effective_input.to_string().to_lowercase();
    if BILLING_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        return Simulated {
            output: json!({ "response": REFUND_REPLY }),
            latency_ms: 150,
        };
    }

    let previous = match original_output.get("response") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    Simulated {
        output: json!({ "response": format!("[Improved with {template}] {previous}") }),
        latency_ms: 100,
    }
}
