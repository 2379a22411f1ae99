//! Daemon configuration
//!
//! Layering, lowest to highest: built-in defaults, the TOML file named by
//! `DHFWK_CONFIG` (default `~/.dhfwk/dhfwk.toml`, optional), then
//! environment variables such as `DHFWK__RPC__PORT=9600`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use dhfwk_core::application::executor::constants::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_CONCURRENT_TASKS,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_SHUTDOWN_TIMEOUT,
};
use dhfwk_infra_system::SubprocessHandlerConfig;

const DEFAULT_CONFIG_PATH: &str = "~/.dhfwk/dhfwk.toml";
const CONFIG_PATH_ENV: &str = "DHFWK_CONFIG";
const ENV_PREFIX: &str = "DHFWK";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub log: LogConfig,
    pub rpc: RpcConfig,
    pub executor: ExecutorSection,
    pub retry: RetrySection,
    pub sys_spec: SysSpecSection,
    /// Keyed by hardware type name ("camera", "audio", ...)
    pub handlers: HashMap<String, SubprocessHandlerConfig>,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// EnvFilter directive used when RUST_LOG is unset
    pub filter: String,
    /// Also write daily-rotated JSON logs here
    pub directory: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "dhfwk=info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcConfig {
    fn default() -> Self {
        let defaults = dhfwk_api_rpc::RpcServerConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    pub max_concurrent_tasks: usize,
    pub dedupe_in_flight: bool,
    pub shutdown_timeout_ms: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            dedupe_in_flight: false,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: i64,
    pub backoff_factor: f64,
    pub retryable_codes: Vec<i32>,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retryable_codes: Vec::new(),
        }
    }
}

/// Codec lists overriding the built-in ones
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SysSpecSection {
    pub audio_encoders: Option<Vec<String>>,
    pub audio_decoders: Option<Vec<String>>,
    pub video_encoders: Option<Vec<String>>,
    pub video_decoders: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// OTLP endpoint, e.g. http://localhost:4317; unset disables export
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: "dhfwk-daemon".to_string(),
        }
    }
}

/// Load from the default locations
pub fn load() -> Result<DaemonConfig> {
    let path = std::env::var(CONFIG_PATH_ENV)
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_CONFIG_PATH).into_owned());
    load_from(Path::new(&path))
}

/// Load with `path` as the file layer. A missing file is not an error.
pub fn load_from(path: &Path) -> Result<DaemonConfig> {
    let settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

    settings
        .try_deserialize()
        .context("Invalid configuration")
}
