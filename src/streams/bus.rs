use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client};
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::error::{AppError, Result};

/// One entry read from a stream. Payloads live in the single `json` field;
/// entries without it are malformed.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    /// Broker-assigned stream id
    pub id: String,
    pub json: Option<String>,
}

/// Redis Streams transport: append, consumer-group read, acknowledge.
///
/// The underlying connection is established lazily so API handlers can
/// surface broker outages as per-request errors instead of failing at
/// startup; the worker forces the connection during bootstrap.
pub struct StreamBus {
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl StreamBus {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Stream(format!("Invalid stream broker URL: {}", e)))?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        self.connection
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await
            .cloned()
            .map_err(|e| AppError::Stream(format!("Stream broker unreachable: {}", e)))
    }

    /// Ensure the consumer group exists, creating the stream if absent.
    /// An existing group is not an error.
    pub async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let created: redis::RedisResult<()> = conn.xgroup_create_mkstream(stream, group, "0").await;
        match created {
            Ok(()) => {
                tracing::info!(stream = %stream, group = %group, "Consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(AppError::Stream(format!(
                "Failed to create consumer group: {}",
                e
            ))),
        }
    }

    /// Append an event as a single `json` field; returns the broker id.
    pub async fn append<T: Serialize>(&self, stream: &str, event: &T) -> Result<String> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.connection().await?;
        conn.xadd(stream, "*", &[("json", payload.as_str())])
            .await
            .map_err(|e| AppError::Stream(format!("Failed to append to {}: {}", stream, e)))
    }

    /// Blocking consumer-group read of never-delivered messages.
    pub async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: usize,
    ) -> Result<Vec<StreamMessage>> {
        let mut conn = self.connection().await?;
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block_ms);

        let reply: StreamReadReply = conn
            .xread_options(&[stream], &[">"], &options)
            .await
            .map_err(|e| AppError::Stream(format!("Failed to read from {}: {}", stream, e)))?;

        let mut messages = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                let json: Option<String> = entry.get("json");
                messages.push(StreamMessage { id: entry.id, json });
            }
        }
        Ok(messages)
    }

    /// Acknowledge a processed message for the group.
    pub async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn
            .xack(stream, group, &[id])
            .await
            .map_err(|e| AppError::Stream(format!("Failed to ack {}: {}", id, e)))?;
        Ok(())
    }
}
