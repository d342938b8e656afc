use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::StreamsConfig;
use crate::error::Result;
use crate::metrics;
use crate::models::{ApprovalRequestEvent, Intent};
use crate::pipeline::{DecisionPipeline, StreamOutcome};
use crate::streams::{StreamBus, StreamMessage};

/// Consumer-group worker over the intent stream.
///
/// Delivery contract is at-least-once: a message is acknowledged only
/// after its decision is durable and the decision event is appended.
/// Anything that fails mid-pipeline leaves the message un-acked for the
/// group to redeliver; redeliveries are detected downstream by the action
/// record keyed on the intent's event id.
pub struct GuardianWorker {
    bus: Arc<StreamBus>,
    pipeline: Arc<DecisionPipeline>,
    config: StreamsConfig,
}

impl GuardianWorker {
    pub fn new(bus: Arc<StreamBus>, pipeline: Arc<DecisionPipeline>, config: StreamsConfig) -> Self {
        Self {
            bus,
            pipeline,
            config,
        }
    }

    /// Create the consumer group (and the stream, if absent). Called once
    /// at startup; failure here is unrecoverable.
    pub async fn bootstrap(&self) -> Result<()> {
        self.bus
            .ensure_group(&self.config.intent, &self.config.consumer_group)
            .await
    }

    /// Read loop. Exits after the in-flight batch when the shutdown signal
    /// flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            stream = %self.config.intent,
            group = %self.config.consumer_group,
            consumer = %self.config.consumer_name,
            "Guardian worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("Shutdown signal received, stopping worker");
                    break;
                }
                batch = self.bus.read_group(
                    &self.config.intent,
                    &self.config.consumer_group,
                    &self.config.consumer_name,
                    self.config.read_count,
                    self.config.block_ms,
                ) => {
                    match batch {
                        Ok(messages) => {
                            for message in messages {
                                self.handle_message(message).await;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Intent stream read failed");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle_message(&self, message: StreamMessage) {
        metrics::INTENTS_CONSUMED_TOTAL.inc();

        let Some(raw) = message.json.as_deref() else {
            self.discard_malformed(&message.id, "missing json field").await;
            return;
        };

        let intent: Intent = match serde_json::from_str(raw) {
            Ok(intent) => intent,
            Err(e) => {
                self.discard_malformed(&message.id, &e.to_string()).await;
                return;
            }
        };

        if let Err(e) = self.process(intent, &message.id).await {
            metrics::PIPELINE_FAILURES_TOTAL.inc();
            tracing::error!(
                stream_id = %message.id,
                error = %e,
                "Pipeline failed, leaving message for redelivery"
            );
        }
    }

    /// Run the pipeline and emit, acking only after everything below
    /// succeeded.
    async fn process(&self, intent: Intent, stream_id: &str) -> Result<()> {
        match self.pipeline.process_stream_intent(intent).await? {
            StreamOutcome::AlreadyProcessed { .. } => self.ack(stream_id).await,
            StreamOutcome::Processed { decision, approval } => {
                self.bus
                    .append(&self.config.decision, &decision.to_event())
                    .await?;

                if let Some(approval) = approval {
                    let event = ApprovalRequestEvent {
                        request_id: approval.request_id,
                        intent_event_id: approval.intent_event_id.clone(),
                        trace_id: decision.trace_id.clone(),
                        risk_score: decision.risk.score,
                        severity: decision.risk.severity,
                        timestamp: Utc::now(),
                    };
                    self.bus.append(&self.config.approval_request, &event).await?;
                }

                self.ack(stream_id).await
            }
        }
    }

    /// Unparseable payloads are acknowledged and dropped; redelivering
    /// them could never succeed.
    async fn discard_malformed(&self, stream_id: &str, reason: &str) {
        metrics::INTENTS_MALFORMED_TOTAL.inc();
        tracing::warn!(stream_id = %stream_id, reason = %reason, "Discarding malformed intent");
        if let Err(e) = self.ack(stream_id).await {
            tracing::warn!(stream_id = %stream_id, error = %e, "Failed to ack malformed intent");
        }
    }

    async fn ack(&self, stream_id: &str) -> Result<()> {
        self.bus
            .ack(&self.config.intent, &self.config.consumer_group, stream_id)
            .await
    }
}
