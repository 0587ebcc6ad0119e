mod settings;

pub use settings::{
    ApiConfig, DigestConfig, JwtConfig, OtelConfig, RealtimeConfig, RedisConfig, ServerConfig,
    Settings, WebSocketConfig,
};
