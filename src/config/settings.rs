use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub push: PushConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted webhook body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Shared key expected in `X-API-Key`; unset disables the check
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Pub/Sub channels carrying webhook event envelopes
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// "memory" or "postgres"
    #[serde(default = "default_memory_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Backend for notice/mute settings: "memory" or "postgres"
    #[serde(default = "default_memory_backend")]
    pub settings_backend: String,
    /// Backend for device tokens: "memory" or "redis"
    #[serde(default = "default_memory_backend")]
    pub device_backend: String,
    #[serde(default = "default_device_key_prefix")]
    pub device_key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Number of push workers
    #[serde(default = "default_push_workers")]
    pub workers: usize,
    /// Job queue capacity; 0 means "same as workers"
    #[serde(default)]
    pub queue_capacity: usize,
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Title used by providers when the message carries none
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub device_type: String,
    pub bundle_id: String,
    pub endpoint: String,
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_body_limit() -> usize {
    4 * 1024 * 1024
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost:5432/pushhook".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300
}

fn default_memory_backend() -> String {
    "memory".to_string()
}

fn default_device_key_prefix() -> String {
    "userDeviceToken:".to_string()
}

fn default_push_workers() -> usize {
    100
}

fn default_lookup_timeout_ms() -> u64 {
    2_000
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

fn default_app_name() -> String {
    "Pushhook".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("redis.url", default_redis_url())?
            .set_default("push.workers", default_push_workers() as i64)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER_PORT, REDIS_URL, PUSH_WORKERS, STORAGE_BACKEND, ...
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("redis.channels"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl PushConfig {
    /// Effective queue capacity (at least 1)
    pub fn effective_queue_capacity(&self) -> usize {
        let capacity = if self.queue_capacity == 0 {
            self.workers
        } else {
            self.queue_capacity
        };
        capacity.max(1)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit: default_body_limit(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            channels: vec![],
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            settings_backend: default_memory_backend(),
            device_backend: default_memory_backend(),
            device_key_prefix: default_device_key_prefix(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            workers: default_push_workers(),
            queue_capacity: 0,
            lookup_timeout_ms: default_lookup_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            app_name: default_app_name(),
            providers: vec![],
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
            redis: RedisConfig::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            directory: DirectoryConfig::default(),
            push: PushConfig::default(),
        }
    }
}
