// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod metrics;

// Re-export infrastructure modules
pub use infrastructure::postgres;
pub use infrastructure::redis;

// Domain layer (business logic)
pub mod directory;
pub mod listener;
pub mod message;
pub mod presence;
pub mod push;
pub mod webhook;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;

// Supporting modules
pub mod telemetry;
