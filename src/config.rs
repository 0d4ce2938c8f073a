use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Incident correlation configuration
    #[serde(default)]
    pub correlation: CorrelationSettings,

    /// Spam rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Time-windowed cache retention
    #[serde(default)]
    pub caches: CacheSettings,

    /// Periodic security sweep configuration
    #[serde(default)]
    pub sweep: SweepSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/automod.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration layered over the embedded defaults
    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref().to_string_lossy().to_string();

        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: AUTOMOD_)
            .add_source(
                config::Environment::with_prefix("AUTOMOD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would disable a window or threshold
    pub fn validate(&self) -> Result<()> {
        if self.correlation.debounce_ms == 0 {
            return Err(AppError::Configuration(
                "correlation.debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.correlation.fingerprint_bytes == 0 {
            return Err(AppError::Configuration(
                "correlation.fingerprint_bytes must be greater than zero".to_string(),
            ));
        }
        if self.rate_limit.window_ms == 0 || self.rate_limit.threshold == 0 {
            return Err(AppError::Configuration(
                "rate_limit.window_ms and rate_limit.threshold must be greater than zero"
                    .to_string(),
            ));
        }
        if self.sweep.interval_secs == 0 {
            return Err(AppError::Configuration(
                "sweep.interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            correlation: CorrelationSettings::default(),
            rate_limit: RateLimitSettings::default(),
            caches: CacheSettings::default(),
            sweep: SweepSettings::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationSettings {
    /// Delay between first sighting of an incident and its alert (milliseconds)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Number of content bytes feeding the incident fingerprint
    #[serde(default = "default_fingerprint_bytes")]
    pub fingerprint_bytes: usize,

    /// Maximum characters of content copied into the alert payload
    #[serde(default = "default_content_preview_chars")]
    pub content_preview_chars: usize,
}

impl CorrelationSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            fingerprint_bytes: default_fingerprint_bytes(),
            content_preview_chars: default_content_preview_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Sliding window length (milliseconds)
    #[serde(default = "default_rate_window_ms")]
    pub window_ms: u64,

    /// Messages within one window that count as spam
    #[serde(default = "default_rate_threshold")]
    pub threshold: u32,
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_ms: default_rate_window_ms(),
            threshold: default_rate_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Message cache retention (seconds)
    #[serde(default = "default_message_retention")]
    pub message_retention_secs: u64,

    /// Join cache retention (seconds)
    #[serde(default = "default_join_retention")]
    pub join_retention_secs: u64,
}

impl CacheSettings {
    pub fn message_retention(&self) -> Duration {
        Duration::from_secs(self.message_retention_secs)
    }

    pub fn join_retention(&self) -> Duration {
        Duration::from_secs(self.join_retention_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            message_retention_secs: default_message_retention(),
            join_retention_secs: default_join_retention(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Enable the periodic security sweep
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between sweeps (seconds)
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl SweepSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Dump Prometheus metrics to the log on shutdown
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_debounce_ms() -> u64 {
    3000
}

fn default_fingerprint_bytes() -> usize {
    32
}

fn default_content_preview_chars() -> usize {
    200
}

fn default_rate_window_ms() -> u64 {
    2000
}

fn default_rate_threshold() -> u32 {
    5
}

fn default_message_retention() -> u64 {
    300 // 5 minutes
}

fn default_join_retention() -> u64 {
    1800 // 30 minutes
}

fn default_sweep_interval() -> u64 {
    300 // 5 minutes
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "automod-correlator".to_string()
}

fn default_true() -> bool {
    true
}
