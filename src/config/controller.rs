//! # Controller Configuration
//!
//! Runtime settings of the job binary loaded from environment variables.

use crate::config::{env_var_or_default, env_var_or_default_bool, env_var_or_default_str};
use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_METRICS_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RUN_INTERVAL_SECS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the CronJob
/// or Deployment manifest.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Seconds between passes. 0 runs a single pass and exits (CronJob mode).
    pub run_interval_secs: u64,
    /// Timeout applied to every Kubernetes API call (seconds)
    pub request_timeout_secs: u64,
    /// Namespaces reconciled concurrently within one pass. 1 is strictly sequential.
    pub max_concurrent_namespaces: usize,
    /// Initial retry delay after a failed pass in loop mode (seconds)
    pub backoff_min_secs: u64,
    /// Maximum retry delay after a failed pass in loop mode (seconds)
    pub backoff_max_secs: u64,
    /// HTTP port for `/metrics`, `/healthz` and `/readyz` in loop mode
    pub metrics_port: u16,
    /// Enable metrics collection
    pub enable_metrics: bool,
    /// Log level used when `RUST_LOG` is not set (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            run_interval_secs: DEFAULT_RUN_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_concurrent_namespaces: 1,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            enable_metrics: true,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            run_interval_secs: env_var_or_default("RUN_INTERVAL_SECS", DEFAULT_RUN_INTERVAL_SECS),
            request_timeout_secs: env_var_or_default(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            max_concurrent_namespaces: env_var_or_default("MAX_CONCURRENT_NAMESPACES", 1_usize)
                .max(1),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            enable_metrics: env_var_or_default_bool("ENABLE_METRICS", true),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
        }
    }

    /// Whether the job runs forever instead of a single pass
    #[must_use]
    pub fn is_loop_mode(&self) -> bool {
        self.run_interval_secs > 0
    }

    /// Get run interval duration
    #[must_use]
    pub fn run_interval_duration(&self) -> Duration {
        Duration::from_secs(self.run_interval_secs)
    }

    /// Get request timeout duration
    #[must_use]
    pub fn request_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
