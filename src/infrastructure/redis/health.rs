//! Redis connection health tracking

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RedisHealthStatus {
    Healthy = 0,
    /// Disconnected; next command attempts a reconnect
    Disconnected = 1,
}

impl RedisHealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedisHealthStatus::Healthy => "healthy",
            RedisHealthStatus::Disconnected => "disconnected",
        }
    }
}

pub struct RedisHealth {
    status: AtomicU8,
    last_connected_ms: AtomicI64,
    failures: AtomicU32,
}

impl RedisHealth {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(RedisHealthStatus::Disconnected as u8),
            last_connected_ms: AtomicI64::new(0),
            failures: AtomicU32::new(0),
        }
    }

    pub fn set_connected(&self) {
        self.status
            .store(RedisHealthStatus::Healthy as u8, Ordering::Release);
        self.last_connected_ms
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Release);
    }

    pub fn set_disconnected(&self) {
        self.status
            .store(RedisHealthStatus::Disconnected as u8, Ordering::Release);
        self.failures.fetch_add(1, Ordering::AcqRel);
    }

    pub fn status(&self) -> RedisHealthStatus {
        match self.status.load(Ordering::Acquire) {
            0 => RedisHealthStatus::Healthy,
            _ => RedisHealthStatus::Disconnected,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == RedisHealthStatus::Healthy
    }

    pub fn last_connected_ms(&self) -> i64 {
        self.last_connected_ms.load(Ordering::Acquire)
    }

    /// Connection failures since start
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }
}

impl Default for RedisHealth {
    fn default() -> Self {
        Self::new()
    }
}
