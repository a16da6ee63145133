//! Read-only directories consulted by the offline push pipeline.
//!
//! - `NotifySettingsDirectory`: per-user notice flag and mute settings
//! - `DeviceDirectory`: uid to push device token / type / bundle id

mod device;
mod settings;

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::config::DirectoryConfig;
use crate::redis::pool::{PoolError, RedisPool};

pub use device::{DeviceDirectory, DeviceRecord, MemoryDeviceDirectory, RedisDeviceDirectory};
pub use settings::{
    MemberMute, MemorySettingsDirectory, NotifySettingsDirectory, PostgresSettingsDirectory,
    UserNotice,
};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Redis error: {0}")]
    Redis(#[from] PoolError),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// Create the settings directory from configuration.
pub fn create_settings_directory(
    config: &DirectoryConfig,
    pg_pool: Option<PgPool>,
) -> Arc<dyn NotifySettingsDirectory> {
    match (config.settings_backend.as_str(), pg_pool) {
        ("postgres", Some(pool)) => {
            tracing::info!("Using PostgreSQL settings directory");
            Arc::new(PostgresSettingsDirectory::new(pool))
        }
        ("postgres", None) => {
            tracing::warn!("PostgreSQL settings directory requested but no pool available, using memory");
            Arc::new(MemorySettingsDirectory::new())
        }
        _ => {
            tracing::info!("Using in-memory settings directory");
            Arc::new(MemorySettingsDirectory::new())
        }
    }
}

/// Create the device directory from configuration.
pub fn create_device_directory(
    config: &DirectoryConfig,
    redis_pool: Option<Arc<RedisPool>>,
) -> Arc<dyn DeviceDirectory> {
    match (config.device_backend.as_str(), redis_pool) {
        ("redis", Some(pool)) => {
            tracing::info!(prefix = %config.device_key_prefix, "Using Redis device directory");
            Arc::new(RedisDeviceDirectory::new(pool, config.device_key_prefix.clone()))
        }
        ("redis", None) => {
            tracing::warn!("Redis device directory requested but no pool available, using memory");
            Arc::new(MemoryDeviceDirectory::new())
        }
        _ => {
            tracing::info!("Using in-memory device directory");
            Arc::new(MemoryDeviceDirectory::new())
        }
    }
}
