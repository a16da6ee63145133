//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::push::PushStatsSnapshot;
use crate::server::AppState;
use crate::webhook::WebhookStatsSnapshot;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub storage_backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisHealthResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
    pub push: PushHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct RedisHealthResponse {
    pub status: String,
    pub connected: bool,
    pub failures: u32,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub pool_size: u32,
    pub idle_connections: u32,
}

#[derive(Debug, Serialize)]
pub struct PushHealthResponse {
    pub accepting: bool,
    pub workers: usize,
    pub capacity: usize,
    pub queued: usize,
    pub providers: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub events: WebhookStatsSnapshot,
    pub push: PushStatsSnapshot,
    pub message_listeners: usize,
    pub status_listeners: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let redis = state.redis_pool.as_ref().map(|pool| {
        let health = pool.health();
        RedisHealthResponse {
            status: health.status().as_str().to_string(),
            connected: health.is_healthy(),
            failures: health.failures(),
        }
    });

    let postgres = state.postgres_pool.as_ref().map(|pool| PostgresHealthResponse {
        pool_size: pool.size(),
        idle_connections: pool.idle_connections(),
    });

    let degraded = state.push_pool.is_closed() || redis.as_ref().is_some_and(|r| !r.connected);
    let status = if degraded { "degraded" } else { "healthy" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        storage_backend: state.webhook.persistence().store().backend_name().to_string(),
        redis,
        postgres,
        push: PushHealthResponse {
            accepting: !state.push_pool.is_closed(),
            workers: state.push_pool.worker_count(),
            capacity: state.push_pool.capacity(),
            queued: state.push_pool.queued(),
            providers: state.providers.len(),
        },
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        events: state.webhook.stats(),
        push: state.push_pool.stats(),
        message_listeners: state.listeners.message_listener_count().await,
        status_listeners: state.listeners.status_listener_count().await,
    })
}
