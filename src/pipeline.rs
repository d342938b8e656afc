use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::classifiers::{apply_tags, classify_intent};
use crate::error::Result;
use crate::metrics;
use crate::models::{
    ActionRecord, Approval, ApprovalInfo, Decision, DecisionRecord, Intent, Verdict,
};
use crate::policy::{decide, target_domain, PolicyLoader};
use crate::scorer::Scorer;
use crate::state::{GuardianStore, PersistOutcome};

/// Outcome of processing a stream-delivered intent
#[derive(Debug)]
pub enum StreamOutcome {
    /// First delivery: records persisted, events ready to emit
    Processed {
        decision: DecisionRecord,
        approval: Option<Approval>,
    },
    /// Redelivery of an intent that was already persisted; nothing written
    AlreadyProcessed { intent_event_id: String },
}

/// Orchestrates classification, policy load, LLM scoring, the decision
/// engine and the persistence side-effects.
///
/// Steps 1-5 (normalize, classify, load, score, decide) are free of
/// side-effects; nothing is written unless they all succeed.
pub struct DecisionPipeline {
    store: Arc<dyn GuardianStore>,
    loader: PolicyLoader,
    scorer: Arc<dyn Scorer>,
    sync_create_approvals: bool,
}

impl DecisionPipeline {
    pub fn new(store: Arc<dyn GuardianStore>, loader: PolicyLoader, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            store,
            loader,
            scorer,
            sync_create_approvals: false,
        }
    }

    /// Persist approvals for REQUIRE_APPROVAL outcomes of the synchronous
    /// path as well.
    pub fn with_sync_approvals(mut self, enabled: bool) -> Self {
        self.sync_create_approvals = enabled;
        self
    }

    pub fn store(&self) -> &Arc<dyn GuardianStore> {
        &self.store
    }

    /// Pure stage of the pipeline: derive the target domain, classify the
    /// payload, load policies, fetch the LLM signal and run the engine.
    async fn evaluate(&self, intent: &mut Intent) -> Result<Verdict> {
        let timer = metrics::PIPELINE_DURATION_SECONDS.start_timer();

        intent.action.target_domain = target_domain(&intent.action.target);

        let tags = classify_intent(intent);
        apply_tags(&mut intent.context, &tags);

        let rules = self.loader.load().await?;
        let signal = self.scorer.score(intent).await;
        let verdict = decide(&intent.to_document(), &rules, Some(&signal));

        timer.observe_duration();
        Ok(verdict)
    }

    /// Synchronous path: evaluate and return the decision record without
    /// persisting an action record. An approval row is created only when
    /// configured.
    pub async fn evaluate_sync(&self, mut intent: Intent) -> Result<DecisionRecord> {
        let verdict = self.evaluate(&mut intent).await?;
        let mut record = decision_record(&intent, verdict);

        if record.decision == Decision::RequireApproval && self.sync_create_approvals {
            let approval = Approval::new(intent.event_id.clone(), record.event_id);
            self.store.create_approval(&approval).await?;
            record.approval.request_id = Some(approval.request_id);
        }

        metrics::DECISIONS_TOTAL
            .with_label_values(&[&record.decision.to_string()])
            .inc();
        Ok(record)
    }

    /// Stream path: evaluate, persist action + decision (+ pending
    /// approval) in one atomic store write, and hand the records back for
    /// emission. Redelivered intents are detected by the action key and
    /// skipped.
    pub async fn process_stream_intent(&self, mut intent: Intent) -> Result<StreamOutcome> {
        let verdict = self.evaluate(&mut intent).await?;

        let action = ActionRecord {
            event_id: intent.event_id.clone(),
            trace_id: intent.trace_id.clone(),
            agent_id: intent.agent_id.clone(),
            action_type: intent.action.action_type.clone(),
            target: intent.action.target.clone(),
            args_hash: args_hash(&intent.action.args),
            context: serde_json::to_value(&intent.context)?,
            created_at: Utc::now(),
        };

        let mut decision = decision_record(&intent, verdict);
        let approval = (decision.decision == Decision::RequireApproval)
            .then(|| Approval::new(intent.event_id.clone(), decision.event_id));
        if let Some(approval) = &approval {
            decision.approval.request_id = Some(approval.request_id);
        }

        match self
            .store
            .persist_evaluation(&action, &decision, approval.as_ref())
            .await?
        {
            PersistOutcome::AlreadyProcessed => {
                tracing::info!(
                    intent_event_id = %intent.event_id,
                    "Intent already processed, skipping redelivery"
                );
                Ok(StreamOutcome::AlreadyProcessed {
                    intent_event_id: intent.event_id,
                })
            }
            PersistOutcome::Stored => {
                metrics::DECISIONS_TOTAL
                    .with_label_values(&[&decision.decision.to_string()])
                    .inc();
                tracing::info!(
                    intent_event_id = %decision.intent_event_id,
                    trace_id = %decision.trace_id,
                    decision = %decision.decision,
                    score = decision.risk.score,
                    "Decision rendered"
                );
                Ok(StreamOutcome::Processed { decision, approval })
            }
        }
    }
}

fn decision_record(intent: &Intent, verdict: Verdict) -> DecisionRecord {
    DecisionRecord {
        event_id: Uuid::new_v4(),
        intent_event_id: intent.event_id.clone(),
        trace_id: intent.trace_id.clone(),
        decision: verdict.decision,
        risk: verdict.risk,
        policy_hits: verdict.policy_hits,
        rewrite: verdict.rewrite,
        approval: ApprovalInfo {
            required: verdict.decision == Decision::RequireApproval,
            request_id: None,
        },
        created_at: Utc::now(),
    }
}

/// Hex SHA-256 over the canonical JSON encoding of `action.args`.
/// serde_json maps iterate key-sorted, so the encoding is stable.
fn args_hash(args: &serde_json::Map<String, serde_json::Value>) -> String {
    let canonical = serde_json::to_string(args).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn args_hash_is_stable_across_key_order() {
        let a: serde_json::Map<String, serde_json::Value> =
            serde_json::from_value(json!({"b": 1, "a": "x"})).unwrap();
        let b: serde_json::Map<String, serde_json::Value> =
            serde_json::from_value(json!({"a": "x", "b": 1})).unwrap();

        assert_eq!(args_hash(&a), args_hash(&b));
        assert_eq!(args_hash(&a).len(), 64);
    }

    #[test]
    fn decision_record_marks_approval_requirement() {
        let intent: Intent = serde_json::from_value(json!({
            "event_id": "evt-1",
            "trace_id": "tr-1",
            "action": {"type": "http.request"}
        }))
        .unwrap();

        let verdict = Verdict {
            decision: Decision::RequireApproval,
            risk: crate::models::RiskAssessment {
                score: 0.65,
                severity: crate::models::Severity::Medium,
                reasons: vec![],
            },
            policy_hits: vec![],
            rewrite: None,
        };

        let record = decision_record(&intent, verdict);
        assert!(record.approval.required);
        assert!(record.approval.request_id.is_none());
    }
}
