//! Infrastructure layer modules
//!
//! - `postgres`: PostgreSQL connection pool
//! - `redis`: Redis connection pool with health tracking

pub mod postgres;
pub mod redis;
