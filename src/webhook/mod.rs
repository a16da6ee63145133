//! Inbound webhook events from the messaging core.
//!
//! `WebhookService` is the single dispatch point for every transport: it maps
//! an event tag to one pipeline and returns that pipeline's result.

mod recipients;
mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::message::MessagePersistence;
use crate::metrics::EventMetrics;
use crate::presence::OnlineStatusHandler;
use crate::push::OfflinePushPipeline;

pub use recipients::{decode_recipients, encode_recipients, RecipientDecodeError};
pub(crate) use types::base64_bytes;
pub use types::{
    ChannelType, MessageHeader, MessageSetting, NotifyMessage, OfflinePushNotify,
    OnlineStatusUpdate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    MessageNotify,
    OfflineNotify,
    OnlineStatus,
}

impl EventKind {
    /// Parse an event tag; upstream dotted aliases are accepted.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "message-notify" | "msg.notify" => Some(EventKind::MessageNotify),
            "offline-notify" | "msg.offline" => Some(EventKind::OfflineNotify),
            "online-status" | "user.onlinestatus" => Some(EventKind::OnlineStatus),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MessageNotify => "message-notify",
            EventKind::OfflineNotify => "offline-notify",
            EventKind::OnlineStatus => "online-status",
        }
    }
}

/// Synchronous result of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Ids of every message in a message-notify batch, in input order
    Accepted(Vec<String>),
    Done,
}

#[derive(Debug, Default)]
pub struct WebhookStats {
    pub events_handled: AtomicU64,
    pub events_failed: AtomicU64,
    pub events_ignored: AtomicU64,
    pub messages_persisted: AtomicU64,
    pub push_jobs_enqueued: AtomicU64,
    pub status_updates: AtomicU64,
}

impl WebhookStats {
    pub fn snapshot(&self) -> WebhookStatsSnapshot {
        WebhookStatsSnapshot {
            events_handled: self.events_handled.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            messages_persisted: self.messages_persisted.load(Ordering::Relaxed),
            push_jobs_enqueued: self.push_jobs_enqueued.load(Ordering::Relaxed),
            status_updates: self.status_updates.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookStatsSnapshot {
    pub events_handled: u64,
    pub events_failed: u64,
    pub events_ignored: u64,
    pub messages_persisted: u64,
    pub push_jobs_enqueued: u64,
    pub status_updates: u64,
}

pub struct WebhookService {
    persistence: Arc<MessagePersistence>,
    offline: Arc<OfflinePushPipeline>,
    presence: Arc<OnlineStatusHandler>,
    stats: WebhookStats,
}

impl WebhookService {
    pub fn new(
        persistence: Arc<MessagePersistence>,
        offline: Arc<OfflinePushPipeline>,
        presence: Arc<OnlineStatusHandler>,
    ) -> Self {
        Self {
            persistence,
            offline,
            presence,
            stats: WebhookStats::default(),
        }
    }

    pub fn persistence(&self) -> &Arc<MessagePersistence> {
        &self.persistence
    }

    pub fn offline(&self) -> &Arc<OfflinePushPipeline> {
        &self.offline
    }

    pub fn stats(&self) -> WebhookStatsSnapshot {
        self.stats.snapshot()
    }

    /// Dispatch one event. Unknown tags succeed without doing anything.
    #[tracing::instrument(name = "webhook.handle_event", skip(self, data), fields(bytes = data.len()))]
    pub async fn handle_event(&self, event: &str, data: &[u8]) -> Result<EventOutcome> {
        let Some(kind) = EventKind::parse(event) else {
            tracing::debug!(event = %event, "Ignoring unknown webhook event");
            self.stats.events_ignored.fetch_add(1, Ordering::Relaxed);
            return Ok(EventOutcome::Done);
        };

        let result = self.dispatch(kind, data).await;

        match &result {
            Ok(_) => {
                self.stats.events_handled.fetch_add(1, Ordering::Relaxed);
                EventMetrics::record_success(kind.as_str());
            }
            Err(e) => {
                self.stats.events_failed.fetch_add(1, Ordering::Relaxed);
                EventMetrics::record_failure(kind.as_str());
                tracing::warn!(event = kind.as_str(), error = %e, "Webhook event failed");
            }
        }
        result
    }

    async fn dispatch(&self, kind: EventKind, data: &[u8]) -> Result<EventOutcome> {
        match kind {
            EventKind::MessageNotify => {
                let messages: Vec<NotifyMessage> = serde_json::from_slice(data)?;
                self.handle_messages(&messages).await
            }
            EventKind::OfflineNotify => {
                let notify: OfflinePushNotify = serde_json::from_slice(data)?;
                let enqueued = self.offline.handle(notify).await?;
                self.stats
                    .push_jobs_enqueued
                    .fetch_add(enqueued as u64, Ordering::Relaxed);
                Ok(EventOutcome::Done)
            }
            EventKind::OnlineStatus => {
                let lines: Vec<String> = serde_json::from_slice(data)?;
                let updates = self.presence.handle(&lines).await;
                self.stats
                    .status_updates
                    .fetch_add(updates.len() as u64, Ordering::Relaxed);
                Ok(EventOutcome::Done)
            }
        }
    }

    /// Persist an already decoded message batch.
    pub async fn handle_messages(&self, messages: &[NotifyMessage]) -> Result<EventOutcome> {
        let ids = self.persistence.store_batch(messages).await?;
        let persisted = messages
            .iter()
            .filter(|m| !m.header.skips_persistence())
            .count();
        self.stats
            .messages_persisted
            .fetch_add(persisted as u64, Ordering::Relaxed);
        Ok(EventOutcome::Accepted(ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_aliases() {
        assert_eq!(EventKind::parse("message-notify"), Some(EventKind::MessageNotify));
        assert_eq!(EventKind::parse("msg.notify"), Some(EventKind::MessageNotify));
        assert_eq!(EventKind::parse("msg.offline"), Some(EventKind::OfflineNotify));
        assert_eq!(EventKind::parse("user.onlinestatus"), Some(EventKind::OnlineStatus));
        assert_eq!(EventKind::parse("msg.recall"), None);
    }
}
