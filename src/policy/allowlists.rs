use std::collections::HashMap;

use crate::config::PolicyConfig;

/// Symbolic name for the external destination allowlist
pub const EXTERNAL_DOMAINS_ALLOWLIST: &str = "EXTERNAL_DOMAINS_ALLOWLIST";

/// Symbolic name for domains inside the trust boundary
pub const INTERNAL_DOMAINS: &str = "INTERNAL_DOMAINS";

/// Registry mapping symbolic allowlist names to concrete value sets.
///
/// Rule documents stay declarative by storing the symbolic name; the policy
/// loader swaps in the concrete values at load time. Adding an allowlist is
/// a configuration change, not a rule-schema change.
#[derive(Debug, Clone, Default)]
pub struct AllowlistRegistry {
    entries: HashMap<String, Vec<String>>,
}

impl AllowlistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration.
    pub fn from_config(config: &PolicyConfig) -> Self {
        let mut registry = Self::new();
        registry.register(EXTERNAL_DOMAINS_ALLOWLIST, config.external_domains.clone());
        registry.register(INTERNAL_DOMAINS, config.internal_domains.clone());
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.entries.insert(name.into(), values);
    }

    /// Concrete values for a symbolic name; None for unknown symbols.
    pub fn resolve(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }
}
