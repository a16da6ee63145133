use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::redis::pool::{RedisPool, RedisPoolExt};

use super::DirectoryError;

/// The push device currently registered for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_token: String,
    pub device_type: String,
    pub bundle_id: String,
}

impl DeviceRecord {
    /// Build from hash fields; `None` when the hash is empty.
    pub fn from_fields(fields: HashMap<String, String>) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        let get = |name: &str| fields.get(name).cloned().unwrap_or_default();
        Some(Self {
            device_token: get("device_token"),
            device_type: get("device_type"),
            bundle_id: get("bundle_id"),
        })
    }
}

#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn lookup(&self, uid: &str) -> Result<Option<DeviceRecord>, DirectoryError>;
}

#[derive(Default)]
pub struct MemoryDeviceDirectory {
    devices: DashMap<String, DeviceRecord>,
}

impl MemoryDeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uid: &str, record: DeviceRecord) {
        self.devices.insert(uid.to_string(), record);
    }

    pub fn remove(&self, uid: &str) {
        self.devices.remove(uid);
    }
}

#[async_trait]
impl DeviceDirectory for MemoryDeviceDirectory {
    async fn lookup(&self, uid: &str) -> Result<Option<DeviceRecord>, DirectoryError> {
        Ok(self.devices.get(uid).map(|d| d.value().clone()))
    }
}

/// Device tokens stored as Redis hashes at `{prefix}{uid}`.
pub struct RedisDeviceDirectory {
    pool: Arc<RedisPool>,
    key_prefix: String,
}

impl RedisDeviceDirectory {
    pub fn new(pool: Arc<RedisPool>, key_prefix: String) -> Self {
        Self { pool, key_prefix }
    }

    fn key(&self, uid: &str) -> String {
        format!("{}{}", self.key_prefix, uid)
    }
}

#[async_trait]
impl DeviceDirectory for RedisDeviceDirectory {
    async fn lookup(&self, uid: &str) -> Result<Option<DeviceRecord>, DirectoryError> {
        let fields = self.pool.hgetall(&self.key(uid)).await?;
        Ok(DeviceRecord::from_fields(fields))
    }
}
