use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use strum::Display;

use crate::models::{Intent, IntentContext};

/// Sensitivity labels the MVP detectors can attach to an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SensitivityTag {
    Secret,
    Pii,
    Phi,
    Pci,
}

static RE_API_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(api[_-]?key|secret|token)\s*[:=]\s*['"]?[A-Za-z0-9_\-]{16,}"#).unwrap()
});

static RE_SSN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

/// Serialize `action.args` into `key=value` lines the detectors scan.
/// Nested maps flatten to dotted keys; map iteration is key-sorted, so the
/// output is deterministic for a given args object.
fn flatten_args(args: &serde_json::Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in args {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => flatten_args(inner, &path, out),
            Value::String(s) => out.push(format!("{path}={s}")),
            other => out.push(format!("{path}={other}")),
        }
    }
}

/// Inspect an intent's action args and report sensitivity tags, in
/// detection order. Pure and deterministic; does not mutate the intent.
pub fn classify_intent(intent: &Intent) -> Vec<SensitivityTag> {
    let mut lines = Vec::new();
    flatten_args(&intent.action.args, "", &mut lines);
    let text = lines.join("\n");

    let mut tags = Vec::new();
    if RE_API_KEY.is_match(&text) {
        tags.push(SensitivityTag::Secret);
    }
    if RE_SSN.is_match(&text) || RE_EMAIL.is_match(&text) {
        tags.push(SensitivityTag::Pii);
    }
    tags
}

/// Merge tags into `context.data_classification` without duplicates.
/// Running the classifier twice leaves the classification list unchanged.
pub fn apply_tags(context: &mut IntentContext, tags: &[SensitivityTag]) {
    for tag in tags {
        let label = tag.to_string();
        if !context.data_classification.contains(&label) {
            context.data_classification.push(label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intent_with_args(args: Value) -> Intent {
        serde_json::from_value(json!({
            "event_id": "evt-1",
            "trace_id": "tr-1",
            "action": {"type": "http.request", "target": "https://example.com", "args": args}
        }))
        .unwrap()
    }

    #[test]
    fn detects_api_key_assignment() {
        let intent = intent_with_args(json!({"text": "api_key=ABCDEF1234567890ZZZZ"}));
        assert_eq!(classify_intent(&intent), vec![SensitivityTag::Secret]);
    }

    #[test]
    fn detects_bare_token_arg() {
        let intent = intent_with_args(json!({"token": "AKIA1234567890ABCDEF"}));
        assert_eq!(classify_intent(&intent), vec![SensitivityTag::Secret]);
    }

    #[test]
    fn detects_ssn_and_email_as_pii_once() {
        let intent =
            intent_with_args(json!({"body": "ssn 123-45-6789 reachable at a@b.com"}));
        assert_eq!(classify_intent(&intent), vec![SensitivityTag::Pii]);
    }

    #[test]
    fn secret_precedes_pii_in_detection_order() {
        let intent = intent_with_args(json!({
            "note": "contact a@b.com",
            "secret": "ABCDEF1234567890ZZZZ"
        }));
        assert_eq!(
            classify_intent(&intent),
            vec![SensitivityTag::Secret, SensitivityTag::Pii]
        );
    }

    #[test]
    fn clean_args_yield_no_tags() {
        let intent = intent_with_args(json!({"query": "weekly report totals"}));
        assert!(classify_intent(&intent).is_empty());
    }

    #[test]
    fn scans_nested_args() {
        let intent = intent_with_args(json!({"payload": {"auth": {"secret": "ABCDEF1234567890ZZZZ"}}}));
        assert_eq!(classify_intent(&intent), vec![SensitivityTag::Secret]);
    }

    #[test]
    fn apply_tags_is_idempotent() {
        let intent = intent_with_args(json!({"token": "AKIA1234567890ABCDEF"}));
        let tags = classify_intent(&intent);

        let mut context = IntentContext::default();
        apply_tags(&mut context, &tags);
        let first = context.data_classification.clone();
        apply_tags(&mut context, &tags);

        assert_eq!(context.data_classification, first);
        assert_eq!(context.data_classification, vec!["SECRET".to_string()]);
    }

    #[test]
    fn preserves_caller_supplied_labels() {
        let intent = intent_with_args(json!({"token": "AKIA1234567890ABCDEF"}));
        let mut context = IntentContext {
            data_classification: vec!["PHI".to_string()],
            ..Default::default()
        };
        apply_tags(&mut context, &classify_intent(&intent));
        assert_eq!(
            context.data_classification,
            vec!["PHI".to_string(), "SECRET".to_string()]
        );
    }
}
