pub mod llm;

pub use llm::LlmScorer;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::models::Intent;

/// Risk signal produced by a scorer.
#[derive(Debug, Clone, Default)]
pub struct RiskSignal {
    /// Risk score in [0, 1]
    pub score: f64,
    /// Up to ten human-readable risk factors
    pub reasons: Vec<String>,
    /// Optional safer version of the action payload
    pub rewrite: Option<Value>,
}

impl RiskSignal {
    /// The zero signal: the engine degrades to policy-only scoring.
    pub fn none() -> Self {
        Self::default()
    }

    /// Enforce the scorer contract: score clamped to [0, 1], reasons capped
    /// at ten entries.
    pub fn normalized(mut self) -> Self {
        self.score = self.score.clamp(0.0, 1.0);
        self.reasons.truncate(10);
        self
    }
}

/// Risk scorer interface.
///
/// Implementations must not fail into the pipeline: any transport, timeout
/// or parse problem yields the zero signal so evaluation proceeds
/// policy-only.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, intent: &Intent) -> RiskSignal;
}

/// Scorer used when no LLM backend is configured.
pub struct DisabledScorer;

#[async_trait]
impl Scorer for DisabledScorer {
    async fn score(&self, _intent: &Intent) -> RiskSignal {
        RiskSignal::none()
    }
}

/// Select the scorer implementation from configuration.
pub fn create_scorer(config: &LlmConfig) -> Arc<dyn Scorer> {
    if config.enabled() {
        tracing::info!(model = %config.model, "LLM risk scorer enabled");
        Arc::new(LlmScorer::new(config.clone()))
    } else {
        tracing::info!("LLM risk scorer disabled, running policy-only");
        Arc::new(DisabledScorer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_clamps_and_truncates() {
        let signal = RiskSignal {
            score: 1.7,
            reasons: (0..15).map(|i| format!("r{i}")).collect(),
            rewrite: None,
        }
        .normalized();

        assert_eq!(signal.score, 1.0);
        assert_eq!(signal.reasons.len(), 10);

        let negative = RiskSignal {
            score: -0.2,
            ..Default::default()
        }
        .normalized();
        assert_eq!(negative.score, 0.0);
    }

    #[tokio::test]
    async fn disabled_scorer_returns_zero_signal() {
        let intent: Intent = serde_json::from_value(serde_json::json!({
            "event_id": "evt-1",
            "trace_id": "tr-1",
            "action": {"type": "http.request"}
        }))
        .unwrap();

        let signal = DisabledScorer.score(&intent).await;
        assert_eq!(signal.score, 0.0);
        assert!(signal.reasons.is_empty());
        assert!(signal.rewrite.is_none());
    }
}
