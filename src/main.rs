use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;

use pushhook::config::Settings;
use pushhook::postgres::PostgresPool;
use pushhook::push::register_configured_providers;
use pushhook::redis::pool::RedisPool;
use pushhook::redis::RedisHealth;
use pushhook::server::{create_app, AppState, Backends};
use pushhook::telemetry::init_tracing;
use pushhook::triggers::RedisEventSubscriber;

/// Time running push jobs get to finish after the server stops
const PUSH_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    init_tracing(&settings.logging);
    tracing::info!("Configuration loaded");

    let postgres_pool = if needs_postgres(&settings) {
        Some(PostgresPool::new(&settings.database).await?)
    } else {
        None
    };

    let redis_pool = if needs_redis(&settings) {
        let health = Arc::new(RedisHealth::new());
        Some(Arc::new(RedisPool::new(settings.redis.clone(), health)?))
    } else {
        None
    };

    let backends = Backends::from_settings(&settings, postgres_pool.clone(), redis_pool.clone());
    let state = AppState::new(settings.clone(), backends);

    let providers = register_configured_providers(&state.providers, &settings.push);
    if providers == 0 {
        tracing::warn!("No push providers configured, offline pushes will not be delivered");
    }
    tracing::info!(providers, "Application state initialized");

    // Redis event subscriber
    let redis_subscriber = Arc::new(RedisEventSubscriber::new(
        settings.redis.clone(),
        state.webhook.clone(),
        redis_pool.clone(),
    ));
    let shutdown_signal = redis_subscriber.shutdown_signal();

    let subscriber = redis_subscriber.clone();
    let redis_handle = tokio::spawn(async move {
        if let Err(e) = subscriber.start().await {
            tracing::error!(error = %e, "Redis subscriber failed");
        }
    });

    let push_pool = state.push_pool.clone();
    let app = create_app(state);

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_signal))
        .await?;

    tracing::info!("Waiting for background tasks to finish...");
    let _ = redis_handle.await;
    push_pool.shutdown(PUSH_DRAIN_TIMEOUT).await;

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn needs_postgres(settings: &Settings) -> bool {
    settings.storage.backend == "postgres" || settings.directory.settings_backend == "postgres"
}

fn needs_redis(settings: &Settings) -> bool {
    settings.directory.device_backend == "redis" || !settings.redis.channels.is_empty()
}

async fn shutdown_signal_handler(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop the Redis subscriber
    let _ = shutdown_tx.send(());
}
