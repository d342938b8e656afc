use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{ActionRecord, Approval, ApprovalStatus, DecisionRecord, PolicyRule};
use crate::state::{GuardianStore, PersistOutcome};

/// Idempotent Action+Decision+Approval write. The existence check on the
/// action key and all three writes execute as one server-side unit: a
/// failed invocation commits nothing, so a redelivered intent either finds
/// no action key and persists the full evaluation, or finds one and is
/// reported as already processed. KEYS[3]/ARGV[3..4] are unused when the
/// decision opened no approval (ARGV[3] empty).
static PERSIST_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        if redis.call('EXISTS', KEYS[1]) == 1 then
            return 'ALREADY_PROCESSED'
        end
        redis.call('SET', KEYS[1], ARGV[1])
        redis.call('SET', KEYS[2], ARGV[2])
        if ARGV[3] ~= '' then
            redis.call('SET', KEYS[3], ARGV[3])
            redis.call('SADD', KEYS[4], ARGV[4])
        end
        return 'OK'
        "#,
    )
});

/// Conditional PENDING -> terminal swap. The status check and the document
/// replacement execute atomically server-side, so concurrent resolvers are
/// serialized and exactly one succeeds.
static RESOLVE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local raw = redis.call('GET', KEYS[1])
        if not raw then
            return 'NOT_FOUND'
        end
        local doc = cjson.decode(raw)
        if doc['status'] ~= 'PENDING' then
            return 'ALREADY_RESOLVED'
        end
        redis.call('SET', KEYS[1], ARGV[1])
        redis.call('SREM', KEYS[2], ARGV[2])
        redis.call('SADD', KEYS[3], ARGV[2])
        return 'OK'
        "#,
    )
});

/// Redis-backed persistent store
#[derive(Clone)]
pub struct RedisStore {
    client: Arc<Client>,
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    /// Create a new Redis store
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::new_with_prefix(redis_url, "guardian").await
    }

    /// Create a new Redis store with custom key prefix
    pub async fn new_with_prefix(redis_url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| AppError::Store(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| AppError::Store(format!("Failed to connect to Redis: {}", e)))?;

        // Test connection
        let mut test_conn = connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut test_conn)
            .await
            .map_err(|e| AppError::Store(format!("Redis connection test failed: {}", e)))?;

        tracing::info!("Initialized Redis store with prefix '{}'", prefix);

        Ok(Self {
            client: Arc::new(client),
            connection,
            key_prefix: prefix.to_string(),
        })
    }

    fn policy_key(&self, policy_id: &str) -> String {
        format!("{}:policy:{}", self.key_prefix, policy_id)
    }

    fn policies_set_key(&self) -> String {
        format!("{}:policies", self.key_prefix)
    }

    fn action_key(&self, event_id: &str) -> String {
        format!("{}:action:{}", self.key_prefix, event_id)
    }

    fn decision_key(&self, event_id: &Uuid) -> String {
        format!("{}:decision:{}", self.key_prefix, event_id)
    }

    fn approval_key(&self, request_id: &Uuid) -> String {
        format!("{}:approval:{}", self.key_prefix, request_id)
    }

    fn approval_status_key(&self, status: ApprovalStatus) -> String {
        format!("{}:approvals:{}", self.key_prefix, status)
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<String> {
        serde_json::to_string(value)
            .map_err(|e| AppError::Store(format!("Failed to serialize document: {}", e)))
    }

    fn deserialize<T: serde::de::DeserializeOwned>(json: &str) -> Result<T> {
        serde_json::from_str(json)
            .map_err(|e| AppError::Store(format!("Failed to deserialize document: {}", e)))
    }

    async fn approvals_by_keys(&self, keys: Vec<String>) -> Result<Vec<Approval>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection.clone();
        let docs: Vec<Option<String>> = conn
            .mget(&keys)
            .await
            .map_err(|e| AppError::Store(format!("Failed to fetch approvals: {}", e)))?;
        docs.into_iter()
            .flatten()
            .map(|json| Self::deserialize(&json))
            .collect()
    }
}

#[async_trait]
impl GuardianStore for RedisStore {
    async fn insert_policy(&self, rule: &PolicyRule) -> Result<bool> {
        let mut conn = self.connection.clone();
        let json = Self::serialize(rule)?;
        let created: bool = conn
            .set_nx(self.policy_key(&rule.policy_id), json)
            .await
            .map_err(|e| AppError::Store(format!("Failed to insert policy: {}", e)))?;
        if created {
            let _: () = conn
                .sadd(self.policies_set_key(), &rule.policy_id)
                .await
                .map_err(|e| AppError::Store(format!("Failed to index policy: {}", e)))?;
            tracing::debug!(policy_id = %rule.policy_id, "Policy inserted");
        }
        Ok(created)
    }

    async fn list_policies(&self) -> Result<Vec<PolicyRule>> {
        let mut conn = self.connection.clone();
        let ids: Vec<String> = conn
            .smembers(self.policies_set_key())
            .await
            .map_err(|e| AppError::Store(format!("Failed to list policies: {}", e)))?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.policy_key(id)).collect();
        let docs: Vec<Option<String>> = conn
            .mget(&keys)
            .await
            .map_err(|e| AppError::Store(format!("Failed to fetch policies: {}", e)))?;

        let mut rules: Vec<PolicyRule> = docs
            .into_iter()
            .flatten()
            .map(|json| Self::deserialize(&json))
            .collect::<Result<_>>()?;
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(rules)
    }

    async fn persist_evaluation(
        &self,
        action: &ActionRecord,
        decision: &DecisionRecord,
        approval: Option<&Approval>,
    ) -> Result<PersistOutcome> {
        let approval_key = approval
            .map(|a| self.approval_key(&a.request_id))
            .unwrap_or_default();
        let approval_json = approval.map(Self::serialize).transpose()?.unwrap_or_default();
        let approval_id = approval
            .map(|a| a.request_id.to_string())
            .unwrap_or_default();

        let mut conn = self.connection.clone();
        let outcome: String = PERSIST_SCRIPT
            .key(self.action_key(&action.event_id))
            .key(self.decision_key(&decision.event_id))
            .key(approval_key)
            .key(self.approval_status_key(ApprovalStatus::Pending))
            .arg(Self::serialize(action)?)
            .arg(Self::serialize(decision)?)
            .arg(approval_json)
            .arg(approval_id)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::Store(format!("Failed to persist evaluation: {}", e)))?;

        match outcome.as_str() {
            "OK" => Ok(PersistOutcome::Stored),
            // a replay of an intent persisted on an earlier delivery
            "ALREADY_PROCESSED" => Ok(PersistOutcome::AlreadyProcessed),
            other => Err(AppError::Store(format!(
                "Unexpected persist outcome: {other}"
            ))),
        }
    }

    async fn create_approval(&self, approval: &Approval) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::pipe()
            .atomic()
            .set(self.approval_key(&approval.request_id), Self::serialize(approval)?)
            .ignore()
            .sadd(
                self.approval_status_key(approval.status),
                approval.request_id.to_string(),
            )
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AppError::Store(format!("Failed to create approval: {}", e)))?;
        Ok(())
    }

    async fn get_approval(&self, request_id: &Uuid) -> Result<Option<Approval>> {
        let mut conn = self.connection.clone();
        let doc: Option<String> = conn
            .get(self.approval_key(request_id))
            .await
            .map_err(|e| AppError::Store(format!("Failed to fetch approval: {}", e)))?;
        doc.map(|json| Self::deserialize(&json)).transpose()
    }

    async fn list_approvals(&self, status: Option<ApprovalStatus>) -> Result<Vec<Approval>> {
        let mut conn = self.connection.clone();
        let statuses = match status {
            Some(status) => vec![status],
            None => vec![
                ApprovalStatus::Pending,
                ApprovalStatus::Approved,
                ApprovalStatus::Denied,
            ],
        };

        let mut keys = Vec::new();
        for status in statuses {
            let ids: Vec<String> = conn
                .smembers(self.approval_status_key(status))
                .await
                .map_err(|e| AppError::Store(format!("Failed to list approvals: {}", e)))?;
            keys.extend(ids.iter().map(|id| format!("{}:approval:{}", self.key_prefix, id)));
        }

        let mut approvals = self.approvals_by_keys(keys).await?;
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
        let pending = self
            .get_approval(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Approval {request_id} not found")))?;

        let resolved = pending.resolved(status, reviewer_id, comment);

        let mut conn = self.connection.clone();
        let outcome: String = RESOLVE_SCRIPT
            .key(self.approval_key(request_id))
            .key(self.approval_status_key(ApprovalStatus::Pending))
            .key(self.approval_status_key(status))
            .arg(Self::serialize(&resolved)?)
            .arg(request_id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::Store(format!("Failed to resolve approval: {}", e)))?;

        match outcome.as_str() {
            "OK" => Ok(resolved),
            "NOT_FOUND" => Err(AppError::NotFound(format!("Approval {request_id} not found"))),
            "ALREADY_RESOLVED" => {
                // second read distinguishes which terminal state won
                let current = self.get_approval(request_id).await?;
                let status = current.map(|a| a.status.to_string()).unwrap_or_default();
                Err(AppError::AlreadyResolved(format!(
                    "Approval {request_id} is {status}"
                )))
            }
            other => Err(AppError::Store(format!(
                "Unexpected resolve outcome: {other}"
            ))),
        }
    }
}
