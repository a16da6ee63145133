mod settings;

pub use settings::{
    ApiConfig, DatabaseConfig, DirectoryConfig, LoggingConfig, ProviderConfig, PushConfig,
    RedisConfig, ServerConfig, Settings, StorageConfig,
};
