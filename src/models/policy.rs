use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::Decision;
use crate::error::{AppError, Result};

/// A policy rule: matcher + effect.
///
/// Rules are stored as declarative documents. `match` maps dotted paths
/// into the intent document to expected values (scalar equality) or
/// expected sets (membership, case-insensitive for list-vs-list);
/// `conditions` carry allowlist predicates whose lists may be symbolic
/// references resolved at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub policy_id: String,

    #[serde(default = "default_version")]
    pub version: u32,

    /// Higher priority rules are considered first
    #[serde(default)]
    pub priority: i64,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(rename = "match", default)]
    pub match_clauses: BTreeMap<String, Value>,

    #[serde(default)]
    pub conditions: Vec<PolicyCondition>,

    pub effect: Decision,

    #[serde(default)]
    pub risk_boost: f64,

    #[serde(default)]
    pub message: String,
}

impl PolicyRule {
    /// Reject rule documents the engine cannot evaluate.
    pub fn validate(&self) -> Result<()> {
        if self.policy_id.trim().is_empty() {
            return Err(AppError::Validation("policy_id must not be empty".to_string()));
        }
        if self.risk_boost < 0.0 {
            return Err(AppError::Validation(format!(
                "risk_boost must be >= 0.0, got {}",
                self.risk_boost
            )));
        }
        Ok(())
    }
}

/// Allowlist predicate attached to a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyCondition {
    /// Matches when the field value is absent from the allowlist
    NotInAllowlist(BTreeMap<String, AllowlistRef>),
    /// Matches when the field value is present in the allowlist
    InAllowlist(BTreeMap<String, AllowlistRef>),
}

/// Allowlist value: either concrete entries or a symbolic name resolved
/// against the registry at load time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowlistRef {
    Values(Vec<String>),
    Symbolic(String),
}

impl AllowlistRef {
    /// Concrete entries to test membership against. An unresolved symbol
    /// degenerates to a single-entry list holding the symbol itself.
    pub fn entries(&self) -> Vec<&str> {
        match self {
            AllowlistRef::Values(values) => values.iter().map(String::as_str).collect(),
            AllowlistRef::Symbolic(name) => vec![name.as_str()],
        }
    }
}

fn default_version() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_rule_document() {
        let rule: PolicyRule = serde_json::from_value(json!({
            "policy_id": "pii_external_exfiltration",
            "priority": 100,
            "match": {
                "action.type": ["http.request"],
                "context.data_classification": ["PII"]
            },
            "conditions": [
                {"not_in_allowlist": {"action.target_domain": "EXTERNAL_DOMAINS_ALLOWLIST"}}
            ],
            "effect": "REQUIRE_APPROVAL",
            "risk_boost": 0.25,
            "message": "Sensitive data + external destination requires approval."
        }))
        .unwrap();

        assert_eq!(rule.version, 1);
        assert!(rule.enabled);
        assert_eq!(rule.effect, Decision::RequireApproval);

        match &rule.conditions[0] {
            PolicyCondition::NotInAllowlist(clause) => {
                let list = clause.get("action.target_domain").unwrap();
                assert!(matches!(list, AllowlistRef::Symbolic(name) if name == "EXTERNAL_DOMAINS_ALLOWLIST"));
            }
            other => panic!("unexpected condition {other:?}"),
        }
    }

    #[test]
    fn concrete_condition_lists_parse_as_values() {
        let condition: PolicyCondition = serde_json::from_value(json!({
            "in_allowlist": {"action.target_domain": ["api.company.com"]}
        }))
        .unwrap();

        match condition {
            PolicyCondition::InAllowlist(clause) => {
                let list = clause.get("action.target_domain").unwrap();
                assert_eq!(list.entries(), vec!["api.company.com"]);
            }
            other => panic!("unexpected condition {other:?}"),
        }
    }

    #[test]
    fn rejects_negative_risk_boost() {
        let rule: PolicyRule = serde_json::from_value(json!({
            "policy_id": "bad",
            "effect": "ALLOW",
            "risk_boost": -0.5
        }))
        .unwrap();

        assert!(rule.validate().is_err());
    }
}
