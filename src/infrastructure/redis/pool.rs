//! Redis connection pool for command traffic.
//!
//! Pub/Sub subscriptions use their own dedicated connection; this pool hands
//! out clones of one multiplexed connection.

use std::collections::HashMap;
use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

use super::RedisHealth;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Connection not available: {0}")]
    ConnectionUnavailable(String),
}

pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    health: Arc<RedisHealth>,
    config: RedisConfig,
}

impl RedisPool {
    pub fn new(config: RedisConfig, health: Arc<RedisHealth>) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            health,
            config,
        })
    }

    /// Get the shared connection, establishing it if needed.
    pub async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        self.connect().await
    }

    async fn connect(&self) -> Result<MultiplexedConnection, PoolError> {
        let mut conn_guard = self.connection.write().await;

        // Another task may have connected while we waited
        if let Some(ref c) = *conn_guard {
            return Ok(c.clone());
        }

        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                *conn_guard = Some(conn.clone());
                self.health.set_connected();
                tracing::info!("Redis pool connection established");
                Ok(conn)
            }
            Err(e) => {
                self.health.set_disconnected();
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Run a command, dropping the cached connection on I/O failures.
    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok(result) => Ok(result),
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    let mut conn_guard = self.connection.write().await;
                    *conn_guard = None;
                    self.health.set_disconnected();
                }
                Err(PoolError::Redis(e))
            }
        }
    }

    pub fn health(&self) -> &Arc<RedisHealth> {
        &self.health
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub async fn ping(&self) -> Result<(), PoolError> {
        self.execute(|mut conn| async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }
}

/// Typed helpers for the commands this service issues.
#[async_trait::async_trait]
pub trait RedisPoolExt {
    /// All fields of a hash; empty when the key does not exist.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, PoolError>;

    /// Publish a message; returns the number of receivers.
    async fn publish(&self, channel: &str, message: &str) -> Result<i64, PoolError>;
}

#[async_trait::async_trait]
impl RedisPoolExt for RedisPool {
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, PoolError> {
        let key = key.to_string();
        self.execute(|mut conn| async move { conn.hgetall(key).await })
            .await
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<i64, PoolError> {
        let channel = channel.to_string();
        let message = message.to_string();
        self.execute(|mut conn| async move { conn.publish(channel, message).await })
            .await
    }
}
