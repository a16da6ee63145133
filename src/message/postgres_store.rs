//! PostgreSQL-backed message store.
//!
//! Table structure (see `migrations/`):
//! - `message` keyed by `(channel_id, message_id)`

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::store::{MessageRecord, MessageStore, MessageTransaction, StoreError};

pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn begin(&self) -> Result<Box<dyn MessageTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn get(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<MessageRecord>, StoreError> {
        let row: Option<MessageRow> = sqlx::query_as(
            r#"
            SELECT message_id, message_seq, client_msg_no, header, setting, signal,
                   from_uid, channel_id, channel_type, timestamp, payload, is_deleted
            FROM message
            WHERE channel_id = $1 AND message_id = $2
            "#,
        )
        .bind(channel_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MessageRecord::from))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl MessageTransaction for PostgresTransaction {
    async fn upsert(&mut self, record: &MessageRecord) -> Result<(), StoreError> {
        // is_deleted is only written on insert
        sqlx::query(
            r#"
            INSERT INTO message (
                message_id, message_seq, client_msg_no, header, setting, signal,
                from_uid, channel_id, channel_type, timestamp, payload, is_deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (channel_id, message_id) DO UPDATE SET
                message_seq = EXCLUDED.message_seq,
                client_msg_no = EXCLUDED.client_msg_no,
                header = EXCLUDED.header,
                setting = EXCLUDED.setting,
                signal = EXCLUDED.signal,
                from_uid = EXCLUDED.from_uid,
                channel_type = EXCLUDED.channel_type,
                timestamp = EXCLUDED.timestamp,
                payload = EXCLUDED.payload,
                updated_at = NOW()
            "#,
        )
        .bind(&record.message_id)
        .bind(record.message_seq)
        .bind(&record.client_msg_no)
        .bind(&record.header)
        .bind(i16::from(record.setting))
        .bind(record.signal)
        .bind(&record.from_uid)
        .bind(&record.channel_id)
        .bind(i16::from(record.channel_type))
        .bind(record.timestamp)
        .bind(&record.payload)
        .bind(record.is_deleted)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    message_id: String,
    message_seq: i64,
    client_msg_no: String,
    header: String,
    setting: i16,
    signal: bool,
    from_uid: String,
    channel_id: String,
    channel_type: i16,
    timestamp: i32,
    payload: Vec<u8>,
    is_deleted: bool,
}

impl From<MessageRow> for MessageRecord {
    fn from(row: MessageRow) -> Self {
        Self {
            message_id: row.message_id,
            message_seq: row.message_seq,
            client_msg_no: row.client_msg_no,
            header: row.header,
            setting: row.setting as u8,
            signal: row.signal,
            from_uid: row.from_uid,
            channel_id: row.channel_id,
            channel_type: row.channel_type as u8,
            timestamp: row.timestamp,
            payload: row.payload,
            is_deleted: row.is_deleted,
        }
    }
}
