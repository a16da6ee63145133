//! Storage abstraction for message records.
//!
//! Persistence happens through a transaction object so that a whole notify
//! batch is applied or discarded as one unit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::webhook::NotifyMessage;

/// Errors that can occur during message store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rejected by the backend (constraint, injected failure, ...)
    #[error("Message {message_id} rejected: {reason}")]
    Rejected { message_id: String, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Stored form of a notify message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: String,
    pub message_seq: i64,
    pub client_msg_no: String,
    /// Header flags as JSON text
    pub header: String,
    pub setting: u8,
    /// Payload is end-to-end encrypted
    pub signal: bool,
    pub from_uid: String,
    /// Storage channel: the fake channel id for person chats
    pub channel_id: String,
    pub channel_type: u8,
    pub timestamp: i32,
    pub payload: Vec<u8>,
    pub is_deleted: bool,
}

impl MessageRecord {
    /// Build a record stored under `channel_id`.
    pub fn from_notify(
        message: &NotifyMessage,
        channel_id: String,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            message_id: message.message_id.to_string(),
            message_seq: i64::from(message.message_seq),
            client_msg_no: message.client_msg_no.clone(),
            header: serde_json::to_string(&message.header)?,
            setting: message.setting.0,
            signal: message.setting.is_encrypted(),
            from_uid: message.from_uid.clone(),
            channel_id,
            channel_type: message.channel_type.as_u8(),
            timestamp: message.timestamp,
            payload: message.payload.clone(),
            is_deleted: false,
        })
    }

    /// Identity used for upserts
    pub fn key(&self) -> (String, String) {
        (self.channel_id.clone(), self.message_id.clone())
    }
}

/// One open unit of work against the message store.
#[async_trait]
pub trait MessageTransaction: Send {
    /// Insert the record, or update it in place if (channel_id, message_id) exists.
    async fn upsert(&mut self, record: &MessageRecord) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn MessageTransaction>, StoreError>;

    /// Fetch a committed record.
    async fn get(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<MessageRecord>, StoreError>;

    /// Backend name for health output
    fn backend_name(&self) -> &'static str;
}
