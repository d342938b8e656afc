use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{ActionRecord, Approval, ApprovalStatus, DecisionRecord, PolicyRule};
use crate::state::{GuardianStore, PersistOutcome};

/// In-memory store (development and testing)
#[derive(Clone, Default)]
pub struct InMemoryStore {
    policies: Arc<DashMap<String, PolicyRule>>,
    actions: Arc<DashMap<String, ActionRecord>>,
    decisions: Arc<DashMap<Uuid, DecisionRecord>>,
    approvals: Arc<DashMap<Uuid, Approval>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GuardianStore for InMemoryStore {
    async fn insert_policy(&self, rule: &PolicyRule) -> Result<bool> {
        match self.policies.entry(rule.policy_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(rule.clone());
                tracing::debug!(policy_id = %rule.policy_id, "Policy inserted");
                Ok(true)
            }
        }
    }

    async fn list_policies(&self) -> Result<Vec<PolicyRule>> {
        let mut rules: Vec<PolicyRule> =
            self.policies.iter().map(|entry| entry.value().clone()).collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(rules)
    }

    async fn persist_evaluation(
        &self,
        action: &ActionRecord,
        decision: &DecisionRecord,
        approval: Option<&Approval>,
    ) -> Result<PersistOutcome> {
        // holding the vacant entry serializes writers on the intent key
        match self.actions.entry(action.event_id.clone()) {
            Entry::Occupied(_) => Ok(PersistOutcome::AlreadyProcessed),
            Entry::Vacant(slot) => {
                slot.insert(action.clone());
                self.decisions.insert(decision.event_id, decision.clone());
                if let Some(approval) = approval {
                    self.approvals.insert(approval.request_id, approval.clone());
                }
                Ok(PersistOutcome::Stored)
            }
        }
    }

    async fn create_approval(&self, approval: &Approval) -> Result<()> {
        self.approvals.insert(approval.request_id, approval.clone());
        Ok(())
    }

    async fn get_approval(&self, request_id: &Uuid) -> Result<Option<Approval>> {
        Ok(self.approvals.get(request_id).map(|entry| entry.clone()))
    }

    async fn list_approvals(&self, status: Option<ApprovalStatus>) -> Result<Vec<Approval>> {
        let mut approvals: Vec<Approval> = self
            .approvals
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|approval| status.map_or(true, |s| approval.status == s))
            .collect();
        approvals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(approvals)
    }

    async fn resolve_approval(
        &self,
        request_id: &Uuid,
        status: ApprovalStatus,
        reviewer_id: Option<String>,
        comment: Option<String>,
    ) -> Result<Approval> {
        match self.approvals.entry(*request_id) {
            Entry::Vacant(_) => Err(AppError::NotFound(format!("Approval {request_id} not found"))),
            Entry::Occupied(mut slot) => {
                // the entry lock serializes racing resolvers; exactly one
                // observes PENDING
                if slot.get().status != ApprovalStatus::Pending {
                    return Err(AppError::AlreadyResolved(format!(
                        "Approval {request_id} is {}",
                        slot.get().status
                    )));
                }
                let resolved = slot.get().resolved(status, reviewer_id, comment);
                slot.insert(resolved.clone());
                Ok(resolved)
            }
        }
    }
}
