use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::RedisConfig;
use crate::redis::pool::{RedisPool, RedisPoolExt};
use crate::webhook::{base64_bytes, WebhookService};

/// Base delay before re-subscribing after a connection error
const RECONNECT_BASE_MS: u64 = 2_000;

/// Upper bound of the random delay added to `RECONNECT_BASE_MS`
const RECONNECT_JITTER_MS: u64 = 3_000;

/// Event envelope received over Redis Pub/Sub
#[derive(Debug, Deserialize)]
pub struct RedisEventEnvelope {
    pub event: String,
    /// Base64 event body
    #[serde(default, with = "base64_bytes")]
    pub data: Vec<u8>,
    pub request_id: Option<String>,
    /// Channel to publish the reply on
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Success,
    Failure,
}

/// Reply published to `reply_to` after dispatch
#[derive(Debug, Serialize)]
pub struct RedisEventReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Redis Pub/Sub event subscriber
pub struct RedisEventSubscriber {
    config: RedisConfig,
    webhook: Arc<WebhookService>,
    replies: Option<Arc<RedisPool>>,
    shutdown: broadcast::Sender<()>,
}

impl RedisEventSubscriber {
    pub fn new(
        config: RedisConfig,
        webhook: Arc<WebhookService>,
        replies: Option<Arc<RedisPool>>,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            config,
            webhook,
            replies,
            shutdown,
        }
    }

    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Run until a shutdown signal arrives, re-subscribing after errors.
    pub async fn start(&self) -> anyhow::Result<()> {
        if self.config.channels.is_empty() {
            tracing::info!("No Redis channels configured, skipping Redis subscriber");
            return Ok(());
        }

        tracing::info!(channels = ?self.config.channels, "Starting Redis event subscriber");
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            match self.run_subscription_loop().await {
                Ok(()) => {
                    tracing::info!("Redis subscriber stopped gracefully");
                    break;
                }
                Err(e) => {
                    let delay = reconnect_delay();
                    tracing::error!(
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Redis subscription error, reconnecting"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        Ok(())
    }

    async fn run_subscription_loop(&self) -> anyhow::Result<()> {
        let client = redis::Client::open(self.config.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        for channel in &self.config.channels {
            if channel.contains('*') || channel.contains('?') || channel.contains('[') {
                pubsub.psubscribe(channel).await?;
                tracing::debug!(pattern = %channel, "Subscribed to pattern");
            } else {
                pubsub.subscribe(channel).await?;
                tracing::debug!(channel = %channel, "Subscribed to channel");
            }
        }

        tracing::info!("Redis subscription established");

        let mut message_stream = pubsub.on_message();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Received shutdown signal");
                    return Ok(());
                }
                msg = message_stream.next() => {
                    let Some(msg) = msg else {
                        anyhow::bail!("Redis message stream ended");
                    };
                    let channel = msg.get_channel_name().to_string();
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to get message payload");
                            continue;
                        }
                    };

                    self.handle_message(&channel, &payload).await;
                }
            }
        }
    }

    #[tracing::instrument(name = "redis.handle_message", skip(self, payload))]
    async fn handle_message(&self, channel: &str, payload: &str) {
        let envelope: RedisEventEnvelope = match serde_json::from_str(payload) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse Redis event envelope");
                return;
            }
        };

        let reply = match self.webhook.handle_event(&envelope.event, &envelope.data).await {
            Ok(_) => RedisEventReply {
                request_id: envelope.request_id.clone(),
                status: EventStatus::Success,
                error: None,
            },
            Err(e) => RedisEventReply {
                request_id: envelope.request_id.clone(),
                status: EventStatus::Failure,
                error: Some(e.client_message()),
            },
        };

        if let Some(reply_to) = envelope.reply_to.as_deref() {
            self.publish_reply(reply_to, &reply).await;
        }
    }

    async fn publish_reply(&self, reply_to: &str, reply: &RedisEventReply) {
        let Some(pool) = &self.replies else {
            tracing::debug!(reply_to = %reply_to, "No Redis pool for replies, dropping reply");
            return;
        };

        let body = match serde_json::to_string(reply) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize event reply");
                return;
            }
        };

        if let Err(e) = pool.publish(reply_to, &body).await {
            tracing::warn!(reply_to = %reply_to, error = %e, "Failed to publish event reply");
        }
    }
}

fn reconnect_delay() -> Duration {
    let jitter = rand::rng().random_range(0..=RECONNECT_JITTER_MS);
    Duration::from_millis(RECONNECT_BASE_MS + jitter)
}
