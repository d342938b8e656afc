use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use uuid::Uuid;

/// Guardian decision for an intent.
///
/// Variant order encodes the restrictiveness ranking used by the engine:
/// `ALLOW < REWRITE < REQUIRE_APPROVAL < BLOCK`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Allow,
    Rewrite,
    RequireApproval,
    Block,
}

/// Risk severity bands
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map an aggregated risk score to a severity band.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.90 {
            Severity::Critical
        } else if score >= 0.70 {
            Severity::High
        } else if score >= 0.40 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Aggregated risk for a decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub severity: Severity,
    pub reasons: Vec<String>,
}

/// Approval linkage carried on a decision
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalInfo {
    pub required: bool,
    pub request_id: Option<Uuid>,
}

/// Engine output: the decision plus its explanatory payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub decision: Decision,
    pub risk: RiskAssessment,
    pub policy_hits: Vec<String>,
    pub rewrite: Option<Value>,
}

/// Persisted record of an observed intent (stream path only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Intent's event id; primary key, duplicate inserts mean redelivery
    pub event_id: String,
    pub trace_id: String,
    pub agent_id: String,
    pub action_type: String,
    pub target: String,
    /// Hex SHA-256 over the canonical JSON of `action.args`
    pub args_hash: String,
    pub context: Value,
    pub created_at: DateTime<Utc>,
}

/// Persisted record of a rendered decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Fresh event id for the decision itself
    pub event_id: Uuid,
    pub intent_event_id: String,
    pub trace_id: String,
    pub decision: Decision,
    pub risk: RiskAssessment,
    pub policy_hits: Vec<String>,
    pub rewrite: Option<Value>,
    pub approval: ApprovalInfo,
    pub created_at: DateTime<Utc>,
}

impl DecisionRecord {
    /// Wire shape appended to the decision stream.
    pub fn to_event(&self) -> DecisionEvent {
        DecisionEvent {
            event_id: self.event_id,
            trace_id: self.trace_id.clone(),
            intent_event_id: self.intent_event_id.clone(),
            timestamp: self.created_at,
            decision: self.decision,
            risk: self.risk.clone(),
            policy_hits: self.policy_hits.clone(),
            rewrite: self.rewrite.clone(),
            approval: self.approval.clone(),
        }
    }
}

/// Decision event consumed by agents from the decision stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub event_id: Uuid,
    pub trace_id: String,
    pub intent_event_id: String,
    pub timestamp: DateTime<Utc>,
    pub decision: Decision,
    pub risk: RiskAssessment,
    pub policy_hits: Vec<String>,
    pub rewrite: Option<Value>,
    pub approval: ApprovalInfo,
}
