//! Policy evaluation and decision logic.
//!
//! `decide` is a pure function: given an intent document, a rule set and an
//! optional LLM risk signal it always returns a verdict. It performs no I/O
//! and holds no state; identical inputs produce byte-identical payloads.

use serde_json::Value;

use crate::models::{
    AllowlistRef, Decision, PolicyCondition, PolicyRule, RiskAssessment, Severity, Verdict,
};
use crate::scorer::RiskSignal;

/// Extract the lowercase host from a target URL; empty string when the
/// target does not parse as a URL.
pub fn target_domain(target: &str) -> String {
    url::Url::parse(target)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_default()
}

/// Dotted-path lookup into the intent document. Absent paths resolve to
/// None, never an error.
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// True when at least one element of `haystack` appears in `needles`,
/// comparing strings case-insensitively. Empty haystacks never match.
fn has_any(haystack: &[Value], needles: &[Value]) -> bool {
    haystack.iter().any(|h| {
        needles.iter().any(|n| match (h.as_str(), n.as_str()) {
            (Some(h), Some(n)) => h.eq_ignore_ascii_case(n),
            _ => h == n,
        })
    })
}

/// Resolve the value a condition compares against the allowlist. The
/// derived `action.target_domain` is recomputed from `action.target` so
/// conditions hold even when the caller left it unset.
fn condition_value(doc: &Value, field: &str) -> Option<String> {
    if field == "action.target_domain" {
        let target = lookup(doc, "action.target").and_then(Value::as_str).unwrap_or("");
        return Some(target_domain(target));
    }
    lookup(doc, field).and_then(Value::as_str).map(str::to_string)
}

fn allowlist_contains(list: &AllowlistRef, value: Option<&str>) -> bool {
    match value {
        Some(v) => list.entries().contains(&v),
        None => false,
    }
}

/// Whether a rule's match clauses and conditions all hold for the intent.
pub fn rule_matches(rule: &PolicyRule, doc: &Value) -> bool {
    for (path, expected) in &rule.match_clauses {
        let actual = lookup(doc, path).unwrap_or(&Value::Null);
        match expected {
            Value::Array(expected_set) => match actual {
                Value::Array(actual_list) => {
                    if !has_any(actual_list, expected_set) {
                        return false;
                    }
                }
                scalar => {
                    if !expected_set.contains(scalar) {
                        return false;
                    }
                }
            },
            other => {
                if actual != other {
                    return false;
                }
            }
        }
    }

    for condition in &rule.conditions {
        match condition {
            PolicyCondition::NotInAllowlist(clause) => {
                for (field, list) in clause {
                    let value = condition_value(doc, field);
                    if allowlist_contains(list, value.as_deref()) {
                        return false;
                    }
                }
            }
            PolicyCondition::InAllowlist(clause) => {
                for (field, list) in clause {
                    let value = condition_value(doc, field);
                    if !allowlist_contains(list, value.as_deref()) {
                        return false;
                    }
                }
            }
        }
    }

    true
}

struct PolicyHit<'a> {
    policy_id: &'a str,
    effect: Decision,
    message: &'a str,
}

/// Deterministic baseline + optional LLM signal.
///
/// The final decision is the most restrictive among policy hit effects and
/// score thresholds; thresholds only ever promote, never demote. The LLM
/// score can only escalate the aggregated score (`max`), and an LLM rewrite
/// is accepted only when the final decision lands on REWRITE.
pub fn decide(doc: &Value, rules: &[PolicyRule], signal: Option<&RiskSignal>) -> Verdict {
    let mut sorted: Vec<&PolicyRule> = rules.iter().filter(|r| r.enabled).collect();
    sorted.sort_by_key(|r| std::cmp::Reverse(r.priority));

    let mut hits: Vec<PolicyHit> = Vec::new();
    let mut base_score = 0.0;
    for rule in sorted {
        if rule_matches(rule, doc) {
            base_score += rule.risk_boost;
            hits.push(PolicyHit {
                policy_id: &rule.policy_id,
                effect: rule.effect,
                message: &rule.message,
            });
        }
    }

    let mut score = base_score;
    let mut reasons: Vec<String> = hits
        .iter()
        .filter(|h| !h.message.is_empty())
        .map(|h| h.message.to_string())
        .collect();

    let llm_rewrite = signal.and_then(|s| s.rewrite.clone());
    if let Some(signal) = signal {
        score = score.max(signal.score);
        reasons.extend(signal.reasons.iter().cloned());
    }

    let mut decision = Decision::Allow;
    for hit in &hits {
        decision = decision.max(hit.effect);
    }

    if score > 0.85 {
        decision = decision.max(Decision::Block);
    } else if score > 0.60 {
        decision = decision.max(Decision::RequireApproval);
    } else if score > 0.30 && llm_rewrite.is_some() {
        decision = decision.max(Decision::Rewrite);
    }

    let rewrite = if decision == Decision::Rewrite {
        llm_rewrite
    } else {
        None
    };

    reasons.truncate(10);

    Verdict {
        decision,
        risk: RiskAssessment {
            score: (score * 10_000.0).round() / 10_000.0,
            severity: Severity::from_score(score),
            reasons,
        },
        policy_hits: hits.iter().map(|h| h.policy_id.to_string()).collect(),
        rewrite,
    }
}
