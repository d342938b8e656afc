//! Shared helpers for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use guardian_supervisor::config::PolicyConfig;
use guardian_supervisor::models::Intent;
use guardian_supervisor::pipeline::DecisionPipeline;
use guardian_supervisor::policy::{seed_default_rules, AllowlistRegistry, PolicyLoader};
use guardian_supervisor::scorer::{RiskSignal, Scorer};
use guardian_supervisor::state::{create_in_memory_store, GuardianStore};

/// Scorer returning a fixed signal
pub struct StaticScorer(pub RiskSignal);

#[async_trait]
impl Scorer for StaticScorer {
    async fn score(&self, _intent: &Intent) -> RiskSignal {
        self.0.clone().normalized()
    }
}

pub fn test_policy_config() -> PolicyConfig {
    PolicyConfig {
        external_domains: vec!["api.company.com".to_string(), "hooks.slack.com".to_string()],
        internal_domains: vec!["intranet.company.com".to_string()],
        seed_defaults: true,
    }
}

/// Pipeline over a fresh in-memory store seeded with the default rules.
pub async fn seeded_pipeline(
    scorer: Arc<dyn Scorer>,
) -> (Arc<DecisionPipeline>, Arc<dyn GuardianStore>) {
    seeded_pipeline_with(scorer, false).await
}

/// Same as [`seeded_pipeline`] with control over sync-path approval
/// persistence.
pub async fn seeded_pipeline_with(
    scorer: Arc<dyn Scorer>,
    sync_approvals: bool,
) -> (Arc<DecisionPipeline>, Arc<dyn GuardianStore>) {
    let store = create_in_memory_store();
    seed_default_rules(&store).await.unwrap();

    let allowlists = Arc::new(AllowlistRegistry::from_config(&test_policy_config()));
    let loader = PolicyLoader::new(store.clone(), allowlists);
    let pipeline = Arc::new(
        DecisionPipeline::new(store.clone(), loader, scorer).with_sync_approvals(sync_approvals),
    );
    (pipeline, store)
}

pub fn zero_scorer() -> Arc<dyn Scorer> {
    Arc::new(StaticScorer(RiskSignal::none()))
}

/// Intent aimed at `target` carrying the given args and classification.
pub fn http_intent(event_id: &str, target: &str, args: Value, classification: Vec<&str>) -> Intent {
    serde_json::from_value(json!({
        "event_id": event_id,
        "trace_id": format!("trace-{event_id}"),
        "agent_id": "agent-7",
        "session_id": "session-1",
        "user_id": "user-9",
        "action": {
            "type": "http.request",
            "tool": "http",
            "target": target,
            "method": "POST",
            "args": args
        },
        "context": {"data_classification": classification}
    }))
    .unwrap()
}
