//! Audit-log redaction.
//!
//! Tool call arguments and results are written to the audit log verbatim
//! except for a small set of patterns that look like secrets or PII. The
//! rules here mirror the original implementation's `utils/redact.py`
//! exactly: email-like substrings are replaced wholesale, and
//! `key=value` pairs whose key looks like a credential have their value
//! replaced but the key kept, so the log still shows which field was
//! redacted.

use serde_json::Value;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
        .expect("static email regex is valid")
});

static TOKEN_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)(api_key|token|secret)=([A-Za-z0-9_-]+)")
        .expect("static token regex is valid")
});

/// Redact emails and `key=value` credential pairs from a plain string.
pub fn redact_text(text: &str) -> String {
    let text = EMAIL_RE.replace_all(text, "[redacted-email]");
    TOKEN_RE.replace_all(&text, "$1=[redacted]").into_owned()
}

/// Recursively redact a JSON value. Strings are passed through
/// [`redact_text`]; arrays and objects are walked; every other type
/// (numbers, bools, null) is left untouched.
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_text(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), redact_json(v));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_email() {
        assert_eq!(redact_text("contact me at a.b+c@example.co.uk"), "contact me at [redacted-email]");
    }

    #[test]
    fn redacts_token_pairs_case_insensitively() {
        assert_eq!(redact_text("API_KEY=abc123 rest"), "API_KEY=[redacted] rest");
        assert_eq!(redact_text("token=xyz"), "token=[redacted]");
    }

    #[test]
    fn leaves_unrelated_text_untouched() {
        assert_eq!(redact_text("nothing sensitive here"), "nothing sensitive here");
    }

    #[test]
    fn redacts_recursively_through_json() {
        let value = json!({
            "user": "a@b.com",
            "nested": {"secret=shh": "api_key=deadbeef"},
            "list": ["token=foo", 42, null, true],
        });
        let redacted = redact_json(&value);
        assert_eq!(redacted["user"], json!("[redacted-email]"));
        assert_eq!(redacted["list"][0], json!("token=[redacted]"));
        assert_eq!(redacted["list"][1], json!(42));
        assert_eq!(redacted["list"][2], json!(null));
    }

    #[test]
    fn idempotent_on_arbitrary_json() {
        let samples = vec![
            json!({"a": "reach me at x@y.com and token=abc"}),
            json!([1, "api_key=zzz", {"k": "secret=q1w2"}]),
            json!("plain"),
            json!(null),
            json!(3.14),
        ];
        for sample in samples {
            let once = redact_json(&sample);
            let twice = redact_json(&once);
            assert_eq!(once, twice, "redaction was not idempotent for {sample:?}");
        }
    }
}
