//! Configuration management for BookSpace services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Cover image storage
    #[serde(default)]
    pub blob_storage: BlobStorageConfig,

    /// Face detection endpoint
    #[serde(default)]
    pub face: FaceConfig,

    /// Timeouts and retries around the two enrichment services
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum accepted cover upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (postgres:// or sqlite:)
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Create missing tables from the entity definitions on startup
    #[serde(default)]
    pub create_schema: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlobStorageConfig {
    /// Storage provider: azure, memory
    #[serde(default = "default_blob_provider")]
    pub provider: String,

    /// Account endpoint, e.g. https://account.blob.core.windows.net
    pub endpoint: Option<String>,

    /// Container holding cover images
    #[serde(default = "default_blob_container")]
    pub container: String,

    /// Shared access signature appended to every request
    pub sas_token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FaceConfig {
    /// Detection provider: azure, static, disabled
    #[serde(default = "default_face_provider")]
    pub provider: String,

    /// Cognitive services endpoint
    pub endpoint: Option<String>,

    /// Subscription key
    pub api_key: Option<String>,

    /// Attributes requested from the detector
    #[serde(default = "default_face_attributes")]
    pub attributes: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrichmentConfig {
    /// Upper bound for a single blob fetch or face analysis call, in milliseconds
    #[serde(default = "default_enrichment_timeout")]
    pub call_timeout_ms: u64,

    /// Retry policy for transient enrichment failures (off when absent)
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// First backoff interval in milliseconds
    #[serde(default = "default_retry_initial")]
    pub initial_interval_ms: u64,

    /// Ceiling for a single backoff interval in milliseconds
    #[serde(default = "default_retry_max_interval")]
    pub max_interval_ms: u64,

    /// Give up once this much time has been spent retrying, in milliseconds
    #[serde(default = "default_retry_max_elapsed")]
    pub max_elapsed_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// `service` label attached to every exported metric
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_max_upload_bytes() -> usize { 4 * 1024 * 1024 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_blob_provider() -> String { "azure".to_string() }
fn default_blob_container() -> String { "covers".to_string() }
fn default_service_timeout() -> u64 { 10 }
fn default_face_provider() -> String { "azure".to_string() }
fn default_face_attributes() -> Vec<String> {
    ["age", "gender", "smile", "glasses", "emotion"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_enrichment_timeout() -> u64 { 5_000 }
fn default_retry_initial() -> u64 { 100 }
fn default_retry_max_interval() -> u64 { 1_000 }
fn default_retry_max_elapsed() -> u64 { 3_000 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "bookspace".to_string() }

impl Default for BlobStorageConfig {
    fn default() -> Self {
        Self {
            provider: default_blob_provider(),
            endpoint: None,
            container: default_blob_container(),
            sas_token: None,
            timeout_secs: default_service_timeout(),
        }
    }
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            provider: default_face_provider(),
            endpoint: None,
            api_key: None,
            attributes: default_face_attributes(),
            timeout_secs: default_service_timeout(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_enrichment_timeout(),
            retry: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_retry_initial(),
            max_interval_ms: default_retry_max_interval(),
            max_elapsed_ms: default_retry_max_elapsed(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__BLOB_STORAGE__CONTAINER=covers
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl EnrichmentConfig {
    /// Per-call timeout as Duration
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                max_upload_bytes: default_max_upload_bytes(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/bookspace".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                create_schema: false,
            },
            blob_storage: BlobStorageConfig::default(),
            face: FaceConfig::default(),
            enrichment: EnrichmentConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
