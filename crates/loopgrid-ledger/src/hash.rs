//! Content hashing and chain linking for tamper evidence.
//!
//! The content hash covers the eight semantic fields of a decision,
//! serialized to canonical JSON. The chain hash binds a content hash to the
//! chain hash of the preceding decision, so altering, inserting, reordering,
//! or deleting any historical record invalidates every later chain hash.
//!
//! Canonical JSON here means: object keys sorted at every depth, `,` and `:`
//! separators with no whitespace, and every non-ASCII character escaped as
//! `\uXXXX`. This matches `json.dumps(obj, sort_keys=True,
//! separators=(",", ":"))`, which the hashes of existing ledgers were
//! computed with.

use std::fmt::Write as _;

use loopgrid_core::{DecisionPayloads, HashAlgorithm};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

/// Stand-in for the predecessor chain hash of the first decision.
pub const GENESIS: &str = "GENESIS";

/// The semantic fields of a decision, in decoded form.
///
/// Absent optional fields hash exactly like explicit `null`.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContent<'a> {
    pub service_name: &'a str,
    pub decision_type: &'a str,
    pub input: &'a Value,
    pub model: &'a Value,
    pub output: &'a Value,
    pub prompt: Option<&'a Value>,
    pub tool_calls: Option<&'a Value>,
    pub metadata: Option<&'a Value>,
}

impl<'a> DecisionContent<'a> {
    pub fn new(
        service_name: &'a str,
        decision_type: &'a str,
        payloads: &'a DecisionPayloads,
    ) -> Self {
        Self {
            service_name,
            decision_type,
            input: &payloads.input,
            model: &payloads.model,
            output: &payloads.output,
            prompt: payloads.prompt.as_ref(),
            tool_calls: payloads.tool_calls.as_ref(),
            metadata: payloads.metadata.as_ref(),
        }
    }

    fn to_value(self) -> Value {
        let opt = |v: Option<&Value>| v.cloned().unwrap_or(Value::Null);

        let mut map = Map::new();
        map.insert(
            "service_name".to_string(),
            Value::String(self.service_name.to_string()),
        );
        map.insert(
            "decision_type".to_string(),
            Value::String(self.decision_type.to_string()),
        );
        map.insert("input".to_string(), self.input.clone());
        map.insert("model".to_string(), self.model.clone());
        map.insert("output".to_string(), self.output.clone());
        map.insert("prompt".to_string(), opt(self.prompt));
        map.insert("tool_calls".to_string(), opt(self.tool_calls));
        map.insert("metadata".to_string(), opt(self.metadata));
        Value::Object(map)
    }
}

/// Hash `bytes` with the given algorithm, returning lowercase hex.
pub fn digest_hex(algorithm: HashAlgorithm, bytes: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
        HashAlgorithm::Blake3 => blake3::hash(bytes).to_hex().to_string(),
    }
}

/// Compute the content hash of a decision's semantic fields.
pub fn compute_content_hash(content: DecisionContent<'_>, algorithm: HashAlgorithm) -> String {
    let canonical = canonical_json(&content.to_value());
    digest_hex(algorithm, canonical.as_bytes())
}

/// Compute the chain hash linking `content_hash` to its predecessor.
///
/// `H(content_hash + ":" + previous)`, with [`GENESIS`] for the first record.
pub fn compute_chain_hash(
    content_hash: &str,
    previous_chain_hash: Option<&str>,
    algorithm: HashAlgorithm,
) -> String {
    let previous = previous_chain_hash.unwrap_or(GENESIS);
    digest_hex(algorithm, format!("{content_hash}:{previous}").as_bytes())
}

/// Serialize a JSON value canonically (sorted keys, compact, ASCII-only).
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out),
        Value::String(s) => write_escaped(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(key, out);
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

/// Integers verbatim, floats the way Python's `repr(float)` prints them.
fn write_number(n: &Number, out: &mut String) {
    match n.as_f64() {
        Some(f) if n.is_f64() => write_float(f, out),
        _ => {
            let _ = write!(out, "{n}");
        }
    }
}

/// Shortest round-trip digits; scientific notation when the decimal
/// exponent is below -4 or at least 16, with a signed two-digit minimum
/// exponent; a trailing `.0` on integral values.
fn write_float(f: f64, out: &mut String) {
    // `{:e}` yields the shortest round-trip digits, e.g. "-1.5e-7".
    let sci = format!("{f:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let mantissa = match mantissa.strip_prefix('-') {
        Some(rest) => {
            out.push('-');
            rest
        }
        None => mantissa,
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if !(-4..16).contains(&exponent) {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "e{sign}{:02}", exponent.unsigned_abs());
    } else if exponent < 0 {
        out.push_str("0.");
        for _ in 0..(-exponent - 1) {
            out.push('0');
        }
        out.push_str(&digits);
    } else {
        let point = exponent as usize + 1;
        if digits.len() > point {
            out.push_str(&digits[..point]);
            out.push('.');
            out.push_str(&digits[point..]);
        } else {
            out.push_str(&digits);
            for _ in digits.len()..point {
                out.push('0');
            }
            out.push_str(".0");
        }
    }
}

fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            // Everything outside printable ASCII, DEL included.
            c if !(' '..='~').contains(&c) => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04x}");
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
