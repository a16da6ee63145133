//! Redis connectivity
//!
//! - `pool`: multiplexed connection shared by the device directory and the
//!   event reply publisher
//! - `RedisHealth`: connection status for the health endpoint

mod health;
pub mod pool;

pub use health::{RedisHealth, RedisHealthStatus};
