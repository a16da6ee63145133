use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::directory::{
    create_device_directory, create_settings_directory, DeviceDirectory, NotifySettingsDirectory,
};
use crate::listener::ListenerRegistry;
use crate::message::{create_message_store, MessagePersistence, MessageStore};
use crate::postgres::PostgresPool;
use crate::presence::OnlineStatusHandler;
use crate::push::{
    EligibilityResolver, OfflinePushPipeline, ProviderRegistry, PushExecutor, PushWorkerPool,
};
use crate::redis::pool::RedisPool;
use crate::redis::RedisHealth;
use crate::webhook::WebhookService;

/// Storage and directory backends the pipelines run against.
pub struct Backends {
    pub message_store: Arc<dyn MessageStore>,
    pub settings_directory: Arc<dyn NotifySettingsDirectory>,
    pub device_directory: Arc<dyn DeviceDirectory>,
    pub postgres_pool: Option<PostgresPool>,
    pub redis_pool: Option<Arc<RedisPool>>,
}

impl Backends {
    /// Select backends from configuration; unavailable pools fall back to memory.
    pub fn from_settings(
        settings: &Settings,
        postgres_pool: Option<PostgresPool>,
        redis_pool: Option<Arc<RedisPool>>,
    ) -> Self {
        let pg = postgres_pool.as_ref().map(|p| p.pool().clone());
        Self {
            message_store: create_message_store(&settings.storage, pg.clone()),
            settings_directory: create_settings_directory(&settings.directory, pg),
            device_directory: create_device_directory(&settings.directory, redis_pool.clone()),
            postgres_pool,
            redis_pool,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub webhook: Arc<WebhookService>,
    pub listeners: Arc<ListenerRegistry>,
    pub providers: Arc<ProviderRegistry>,
    pub push_pool: Arc<PushWorkerPool>,
    pub redis_health: Arc<RedisHealth>,
    pub redis_pool: Option<Arc<RedisPool>>,
    pub postgres_pool: Option<PostgresPool>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the pipelines and start the push worker pool.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(settings: Settings, backends: Backends) -> Self {
        let listeners = Arc::new(ListenerRegistry::new());
        let providers = Arc::new(ProviderRegistry::new());

        let executor = Arc::new(PushExecutor::new(
            backends.device_directory,
            Arc::clone(&providers),
            &settings.push,
        ));
        let push_pool = Arc::new(PushWorkerPool::from_config(executor, &settings.push));

        let persistence = Arc::new(MessagePersistence::new(
            backends.message_store,
            Arc::clone(&listeners),
        ));
        let offline = Arc::new(OfflinePushPipeline::new(
            EligibilityResolver::new(backends.settings_directory),
            Arc::clone(&push_pool),
        ));
        let presence = Arc::new(OnlineStatusHandler::new(Arc::clone(&listeners)));
        let webhook = Arc::new(WebhookService::new(persistence, offline, presence));

        let redis_health = backends
            .redis_pool
            .as_ref()
            .map(|p| Arc::clone(p.health()))
            .unwrap_or_else(|| Arc::new(RedisHealth::new()));

        Self {
            settings: Arc::new(settings),
            webhook,
            listeners,
            providers,
            push_pool,
            redis_health,
            redis_pool: backends.redis_pool,
            postgres_pool: backends.postgres_pool,
            start_time: Instant::now(),
        }
    }

    /// Without database or Redis pools every backend is in-memory.
    pub fn in_memory(settings: Settings) -> Self {
        let backends = Backends::from_settings(&settings, None, None);
        Self::new(settings, backends)
    }
}
