//! Message persistence for message-notify events.
//!
//! # Backends
//!
//! - `MemoryMessageStore`: DashMap storage (default, tests)
//! - `PostgresMessageStore`: `message` table, one `sqlx` transaction per batch
//!
//! Use `create_message_store()` to pick one from configuration.

mod channel;
mod memory_store;
mod pipeline;
mod postgres_store;
mod store;

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorageConfig;

pub use channel::fake_channel_id;
pub use memory_store::MemoryMessageStore;
pub use pipeline::MessagePersistence;
pub use postgres_store::PostgresMessageStore;
pub use store::{MessageRecord, MessageStore, MessageTransaction, StoreError};

/// Create a message store based on configuration.
///
/// `"postgres"` requires a pool; without one the memory store is used.
pub fn create_message_store(
    config: &StorageConfig,
    pg_pool: Option<PgPool>,
) -> Arc<dyn MessageStore> {
    match (config.backend.as_str(), pg_pool) {
        ("postgres", Some(pool)) => {
            tracing::info!("Using PostgreSQL message store");
            Arc::new(PostgresMessageStore::new(pool))
        }
        ("postgres", None) => {
            tracing::warn!("PostgreSQL message store requested but no pool available, using memory");
            Arc::new(MemoryMessageStore::new())
        }
        _ => {
            tracing::info!("Using in-memory message store");
            Arc::new(MemoryMessageStore::new())
        }
    }
}
