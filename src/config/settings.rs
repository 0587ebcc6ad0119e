use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Key producers must send in `X-API-Key`; unset disables the check
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Subscribe to producer events over Redis pub/sub
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

/// Server-side WebSocket session housekeeping
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Heartbeat interval in seconds (server sends heartbeat)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Connection timeout in seconds (disconnect if no activity)
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Cleanup task interval in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
    /// Seconds a socket may stay unauthenticated
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout: u64,
}

/// Client-side reconnection policy for [`crate::realtime::RealtimeChannel`]
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Delay before the first reconnect, in milliseconds
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_delay_ms: u64,
    /// Upper bound on the reconnect delay, in milliseconds
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Attempts before giving up until the next explicit connect
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_max_attempts: u32,
    /// Jitter factor applied to reconnect delays (0.0 - 1.0)
    #[serde(default)]
    pub reconnect_jitter: f64,
    /// Inbound silence, in seconds, treated as a dead transport
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout: u64,
    /// Client ping interval in seconds
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    /// How often due digest buckets are drained, in seconds
    #[serde(default = "default_flush_interval")]
    pub flush_interval: u64,
    /// Maximum notifications kept per bucket
    #[serde(default = "default_max_per_bucket")]
    pub max_per_bucket: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_heartbeat_interval() -> u64 {
    15
}

fn default_connection_timeout() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    30
}

fn default_auth_timeout() -> u64 {
    10
}

fn default_reconnect_initial_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    5_000
}

fn default_reconnect_attempts() -> u32 {
    5
}

fn default_heartbeat_timeout() -> u64 {
    20
}

fn default_ping_interval() -> u64 {
    8
}

fn default_flush_interval() -> u64 {
    60
}

fn default_max_per_bucket() -> usize {
    200
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "ara-notification-engine".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("redis.url", "redis://localhost:6379")?
            .set_default("websocket.heartbeat_interval", 15)?
            .set_default("websocket.connection_timeout", 60)?
            .set_default("websocket.cleanup_interval", 30)?
            .set_default("digest.flush_interval", 60)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER_HOST, SERVER_PORT, JWT_SECRET, REDIS_URL, OTEL_ENABLED, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl RealtimeConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            channels: vec![],
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            connection_timeout: default_connection_timeout(),
            cleanup_interval: default_cleanup_interval(),
            auth_timeout: default_auth_timeout(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            reconnect_initial_delay_ms: default_reconnect_initial_ms(),
            reconnect_max_delay_ms: default_reconnect_max_ms(),
            reconnect_max_attempts: default_reconnect_attempts(),
            reconnect_jitter: 0.0,
            heartbeat_timeout: default_heartbeat_timeout(),
            ping_interval: default_ping_interval(),
        }
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            flush_interval: default_flush_interval(),
            max_per_bucket: default_max_per_bucket(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8081);
    }

    #[test]
    fn test_realtime_defaults() {
        let realtime = RealtimeConfig::default();
        assert_eq!(realtime.reconnect_initial_delay_ms, 1_000);
        assert_eq!(realtime.reconnect_max_delay_ms, 5_000);
        assert_eq!(realtime.reconnect_max_attempts, 5);
        assert_eq!(realtime.heartbeat_timeout(), Duration::from_secs(20));
        assert!(realtime.ping_interval() < realtime.heartbeat_timeout());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let settings: Settings = Config::builder()
            .set_override("jwt.secret", "s3cret")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.jwt.secret, "s3cret");
        assert_eq!(settings.digest.flush_interval, 60);
        assert!(!settings.redis.enabled);
        assert!(!settings.otel.enabled);
    }
}
