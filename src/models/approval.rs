use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::Severity;

/// Lifecycle status of an approval request
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

/// Durable work item created for every REQUIRE_APPROVAL decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub request_id: Uuid,
    pub intent_event_id: String,
    pub decision_event_id: Uuid,
    pub status: ApprovalStatus,
    pub reviewer_id: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set iff status is terminal
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Approval {
    /// Open a new pending approval linking an intent to its decision.
    pub fn new(intent_event_id: String, decision_event_id: Uuid) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            intent_event_id,
            decision_event_id,
            status: ApprovalStatus::Pending,
            reviewer_id: None,
            comment: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Build the terminal copy of this approval. Storage layers apply it
    /// conditionally; callers must not mutate status any other way.
    pub fn resolved(
        &self,
        status: ApprovalStatus,
        reviewer_id: Option<String>,
        comment: Option<String>,
    ) -> Self {
        Self {
            status,
            reviewer_id,
            comment,
            resolved_at: Some(Utc::now()),
            ..self.clone()
        }
    }
}

/// Event appended to the approval-decision stream when a human resolves a
/// pending approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecisionEvent {
    pub request_id: Uuid,
    pub decision: ApprovalStatus,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Event appended to the approval-request stream when a pending approval is
/// opened by the worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequestEvent {
    pub request_id: Uuid,
    pub intent_event_id: String,
    pub trace_id: String,
    pub risk_score: f64,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_approval_is_pending_and_unresolved() {
        let approval = Approval::new("evt-1".to_string(), Uuid::new_v4());
        assert_eq!(approval.status, ApprovalStatus::Pending);
        assert!(approval.resolved_at.is_none());
        assert!(approval.reviewer_id.is_none());
    }

    #[test]
    fn resolved_copy_sets_terminal_fields() {
        let approval = Approval::new("evt-1".to_string(), Uuid::new_v4());
        let done = approval.resolved(
            ApprovalStatus::Approved,
            Some("alice".to_string()),
            Some("looks fine".to_string()),
        );

        assert_eq!(done.status, ApprovalStatus::Approved);
        assert!(done.resolved_at.is_some());
        assert_eq!(done.request_id, approval.request_id);
        // the original stays pending
        assert_eq!(approval.status, ApprovalStatus::Pending);
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ApprovalStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(ApprovalStatus::Denied.to_string(), "DENIED");
    }
}
