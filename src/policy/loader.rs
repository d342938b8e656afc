use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{AllowlistRef, PolicyCondition, PolicyRule};
use crate::policy::allowlists::{AllowlistRegistry, EXTERNAL_DOMAINS_ALLOWLIST};
use crate::state::GuardianStore;

/// Materializes rule documents from the store into the engine's in-memory
/// form, resolving symbolic allowlist references against the registry.
#[derive(Clone)]
pub struct PolicyLoader {
    store: Arc<dyn GuardianStore>,
    allowlists: Arc<AllowlistRegistry>,
}

impl PolicyLoader {
    pub fn new(store: Arc<dyn GuardianStore>, allowlists: Arc<AllowlistRegistry>) -> Self {
        Self { store, allowlists }
    }

    /// Load all enabled rules. Fails loudly when the backing store is
    /// unreachable; the engine is never invoked with a partial rule set.
    pub async fn load(&self) -> Result<Vec<PolicyRule>> {
        let rules = self
            .store
            .list_policies()
            .await
            .map_err(|e| AppError::PolicyLoad(e.to_string()))?;

        Ok(rules
            .into_iter()
            .filter(|rule| rule.enabled)
            .map(|rule| resolve_rule(rule, &self.allowlists))
            .collect())
    }
}

/// Swap symbolic allowlist references for their concrete values. Unknown
/// symbols pass through unchanged (reserved for future registries).
fn resolve_rule(mut rule: PolicyRule, registry: &AllowlistRegistry) -> PolicyRule {
    for condition in &mut rule.conditions {
        let clause = match condition {
            PolicyCondition::NotInAllowlist(clause) | PolicyCondition::InAllowlist(clause) => clause,
        };
        for list in clause.values_mut() {
            if let AllowlistRef::Symbolic(name) = list {
                if let Some(values) = registry.resolve(name) {
                    *list = AllowlistRef::Values(values.to_vec());
                }
            }
        }
    }
    rule
}

/// Default rule set seeded into an empty policy store.
pub fn default_rules() -> Vec<PolicyRule> {
    serde_json::from_value(serde_json::json!([
        {
            "policy_id": "pii_external_exfiltration",
            "version": 1,
            "enabled": true,
            "priority": 100,
            "match": {
                "action.type": ["http.request", "email.send", "slack.post"],
                "context.data_classification": ["PII", "PHI", "PCI", "PII_POSSIBLE", "SECRET"]
            },
            "conditions": [
                {"not_in_allowlist": {"action.target_domain": EXTERNAL_DOMAINS_ALLOWLIST}}
            ],
            "effect": "REQUIRE_APPROVAL",
            "risk_boost": 0.25,
            "message": "Sensitive data + external destination requires approval."
        },
        {
            "policy_id": "block_secrets_anywhere",
            "version": 1,
            "enabled": true,
            "priority": 200,
            "match": {"context.data_classification": ["SECRET"]},
            "effect": "BLOCK",
            "risk_boost": 0.95,
            "message": "Secrets must never be transmitted."
        }
    ]))
    .expect("default rules are well-formed")
}

/// Seed the default rules, skipping any policy_id that already exists.
/// Returns how many rules were inserted.
pub async fn seed_default_rules(store: &Arc<dyn GuardianStore>) -> Result<usize> {
    let mut inserted = 0;
    for rule in default_rules() {
        if store.insert_policy(&rule).await? {
            tracing::info!(policy_id = %rule.policy_id, "Seeded policy");
            inserted += 1;
        }
    }
    Ok(inserted)
}
