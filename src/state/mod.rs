pub mod factory;
pub mod memory;
pub mod redis_store;

pub use factory::{create_in_memory_store, create_store};
pub use memory::InMemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ActionRecord, Approval, ApprovalStatus, DecisionRecord, PolicyRule};

/// Outcome of persisting an evaluation on the stream path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// All records written
    Stored,
    /// The action key already existed: the intent was processed on an
    /// earlier delivery, nothing was written
    AlreadyProcessed,
}

/// Durable store behind the decision pipeline and the approvals API.
///
/// Policies, actions, decisions and approvals are keyed documents. The two
/// contractual subtleties live here: `persist_evaluation` is idempotent on
/// the intent's event id (redelivery safety), and `resolve_approval` is a
/// conditional PENDING-to-terminal transition of which exactly one
/// concurrent caller wins.
#[async_trait]
pub trait GuardianStore: Send + Sync {
    /// Insert a policy rule document. Returns false (and writes nothing)
    /// when the policy_id already exists.
    async fn insert_policy(&self, rule: &PolicyRule) -> Result<bool>;

    /// All policy rule documents, enabled or not.
    async fn list_policies(&self) -> Result<Vec<PolicyRule>>;

    /// Atomically persist the action record, its decision and an optional
    /// pending approval. Keyed by the intent's event id.
    async fn persist_evaluation(
        &self,
        action: &ActionRecord,
        decision: &DecisionRecord,
        approval: Option<&Approval>,
    ) -> Result<PersistOutcome>;

    /// Insert a pending approval outside the stream path (sync evaluate
    /// with persistence configured).
    async fn create_approval(&self, approval: &Approval) -> Result<()>;

    /// Fetch one approval.
    async fn get_approval(&self, request_id: &Uuid) -> Result<Option<Approval>>;

    /// List approvals, newest first, optionally filtered by status.
    async fn list_approvals(&self, status: Option<ApprovalStatus>) -> Result<Vec<Approval>>;

    /// Conditionally move a PENDING approval to a terminal status. Errors:
    /// `NotFound` for unknown ids, `AlreadyResolved` when the approval is
    /// no longer pending.
    async fn resolve_approval(
        &self,
        request_id: &Uuid,
        status: ApprovalStatus,
        reviewer_id: Option<String>,
        comment: Option<String>,
    ) -> Result<Approval>;
}
