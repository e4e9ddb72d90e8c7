//! # Logging
//!
//! tracing-subscriber setup. `RUST_LOG` wins over `LOG_LEVEL`; `LOG_FORMAT=json`
//! switches to one JSON object per line for log shipping.

use crate::config::ControllerConfig;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

#[must_use]
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("kube_esg={},warn", default_level.to_ascii_lowercase()))
    })
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(&config.log_level));

    let result = if config.log_format.eq_ignore_ascii_case("json") {
        builder
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .try_init()
    } else {
        builder.with_target(false).try_init()
    };

    result.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
