use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action intent submitted by a supervised agent.
///
/// This is the unit flowing through the intent stream and the synchronous
/// evaluate endpoint. `action.target_domain` and the classifier tags in
/// `context.data_classification` are populated by the pipeline before any
/// rule is matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// Unique event identifier (agent-assigned on the stream path)
    pub event_id: String,

    /// Agent-chosen correlation identifier
    pub trace_id: String,

    /// Submission timestamp
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub agent_id: String,

    #[serde(default)]
    pub session_id: String,

    #[serde(default)]
    pub user_id: String,

    /// The proposed action
    pub action: ActionSpec,

    /// Caller-supplied context
    #[serde(default)]
    pub context: IntentContext,
}

/// The action an agent proposes to perform
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Action type, e.g. `http.request`, `email.send`
    #[serde(rename = "type", default)]
    pub action_type: String,

    /// Tool the agent intends to invoke
    #[serde(default)]
    pub tool: String,

    /// URL or path the action is aimed at
    #[serde(default)]
    pub target: String,

    /// HTTP method where applicable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Free-form action arguments
    #[serde(default)]
    pub args: serde_json::Map<String, Value>,

    /// Domain derived from `target`; empty string when the target is not a
    /// URL. Computed by the pipeline, never trusted from the caller.
    #[serde(default)]
    pub target_domain: String,
}

/// Context accompanying an intent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_output_excerpt: Option<String>,

    /// Sensitivity labels; classifiers append, callers may pre-populate
    #[serde(default)]
    pub data_classification: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,

    #[serde(default)]
    pub attachments: Vec<Value>,
}

impl Intent {
    /// View the intent as a JSON document for dotted-path rule matching.
    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
