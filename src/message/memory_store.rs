//! In-memory message store.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::store::{MessageRecord, MessageStore, MessageTransaction, StoreError};

type RecordMap = DashMap<(String, String), MessageRecord>;

/// DashMap-backed store. Upserts are staged per transaction and only become
/// visible on commit.
#[derive(Default)]
pub struct MemoryMessageStore {
    records: Arc<RecordMap>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn begin(&self) -> Result<Box<dyn MessageTransaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            records: self.records.clone(),
            staged: Vec::new(),
        }))
    }

    async fn get(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<MessageRecord>, StoreError> {
        Ok(self
            .records
            .get(&(channel_id.to_string(), message_id.to_string()))
            .map(|r| r.value().clone()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryTransaction {
    records: Arc<RecordMap>,
    staged: Vec<MessageRecord>,
}

#[async_trait]
impl MessageTransaction for MemoryTransaction {
    async fn upsert(&mut self, record: &MessageRecord) -> Result<(), StoreError> {
        self.staged.push(record.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { records, staged } = *self;
        for record in staged {
            match records.entry(record.key()) {
                // Deletion is owned elsewhere; keep the flag on update
                Entry::Occupied(mut existing) => {
                    let is_deleted = existing.get().is_deleted;
                    existing.insert(MessageRecord {
                        is_deleted,
                        ..record
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        tracing::debug!(discarded = self.staged.len(), "Memory transaction rolled back");
        Ok(())
    }
}
