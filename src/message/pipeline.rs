use std::sync::Arc;

use crate::listener::ListenerRegistry;
use crate::metrics::PersistenceMetrics;
use crate::webhook::NotifyMessage;

use super::channel::fake_channel_id;
use super::store::{MessageRecord, MessageStore, StoreError};

/// Persists message-notify batches.
pub struct MessagePersistence {
    store: Arc<dyn MessageStore>,
    listeners: Arc<ListenerRegistry>,
}

impl MessagePersistence {
    pub fn new(store: Arc<dyn MessageStore>, listeners: Arc<ListenerRegistry>) -> Self {
        Self { store, listeners }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Store a batch in one transaction and return the ids of all input
    /// messages, in input order.
    ///
    /// Messages flagged `sync_once` or `no_persist` are acknowledged but not
    /// stored. Any storage failure rolls back the whole batch. Listeners only
    /// see the subset that was stored, after commit.
    #[tracing::instrument(name = "persistence.store_batch", skip_all, fields(batch_size = messages.len()))]
    pub async fn store_batch(&self, messages: &[NotifyMessage]) -> Result<Vec<String>, StoreError> {
        let mut message_ids = Vec::with_capacity(messages.len());
        if messages.is_empty() {
            return Ok(message_ids);
        }

        let mut tx = self.store.begin().await?;
        let mut committed = Vec::new();

        for message in messages {
            message_ids.push(message.message_id.to_string());

            if message.header.skips_persistence() {
                PersistenceMetrics::record_skipped();
                continue;
            }

            let channel_id = if message.channel_type.is_person() {
                fake_channel_id(&message.from_uid, &message.channel_id)
            } else {
                message.channel_id.clone()
            };

            let result = match MessageRecord::from_notify(message, channel_id) {
                Ok(record) => tx.upsert(&record).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::error!(
                    message_id = message.message_id,
                    channel_id = %message.channel_id,
                    error = %e,
                    "Failed to store message, rolling back batch"
                );
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "Rollback failed");
                }
                PersistenceMetrics::record_rollback();
                return Err(e);
            }

            committed.push(message.clone());
        }

        if let Err(e) = tx.commit().await {
            tracing::error!(error = %e, "Failed to commit message batch");
            PersistenceMetrics::record_rollback();
            return Err(e);
        }

        PersistenceMetrics::record_persisted(committed.len() as u64);
        tracing::debug!(
            received = messages.len(),
            stored = committed.len(),
            "Message batch committed"
        );

        if !committed.is_empty() {
            self.listeners.notify_messages(&committed).await;
        }

        Ok(message_ids)
    }
}
