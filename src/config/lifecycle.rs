//! # Lifecycle Configuration
//!
//! Policy for which namespaces are managed, when they are deactivated and
//! how subscriber lists are bounded.

use crate::config::{env_var_opt, env_var_or_default, env_var_or_default_str};
use crate::constants::{
    DEFAULT_MAX_SUBSCRIBERS, DEFAULT_NAMESPACE, DEFAULT_RESERVED_NAMESPACE_PATTERN,
    DEFAULT_SENTINEL_NODE_SELECTOR_KEY, DEFAULT_SENTINEL_NODE_SELECTOR_VALUE,
    DEFAULT_SERVICE_ACCOUNT_NAME, DEFAULT_SHUTDOWN_DAYS, DEFAULT_SUBSCRIBER_ANNOTATION_MAX_BYTES,
    DEFAULT_WARNING_DAYS, MAX_SHUTDOWN_DAYS, MIN_SHUTDOWN_DAYS,
};
use chrono::TimeDelta;
use thiserror::Error;
use tracing::warn;

/// A schedule offset that cannot produce a future deadline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShutdownOffsetError {
    #[error("shutdown offset of {days} days is outside {min}..={max}")]
    OutOfRange { days: i64, min: i64, max: i64 },
    #[error("shutdown offset of {days} days overflows the calendar")]
    Overflow { days: i64 },
}

/// Scheduling and deactivation policy
///
/// Shared by the reconciliation job and the collaborator actions so that both
/// agree on the offset, the limits and which namespaces are managed.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Regex matched against namespace names; matches are never managed
    pub reserved_namespace_pattern: String,
    /// Literal default namespace, never managed
    pub default_namespace: String,
    /// Namespace the job itself runs in, never managed
    pub own_namespace: Option<String>,
    /// When set, only namespaces carrying this label with a non-blank value are managed
    pub target_label_name: Option<String>,
    /// Days between scheduling (or extension) and deactivation
    pub shutdown_days: i64,
    /// Node-selector key merged into DaemonSets to keep them off every node
    pub sentinel_selector_key: String,
    /// Node-selector value paired with `sentinel_selector_key`
    pub sentinel_selector_value: String,
    /// Maximum number of subscribers per namespace
    pub max_subscribers: usize,
    /// Maximum serialized size of the subscriber annotation (bytes)
    pub subscriber_annotation_max_bytes: usize,
    /// Identity stamped into `next-shutdown-by` by the job
    pub system_actor: String,
    /// Days before the deadline at which subscribers get a warning
    pub warning_days: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            reserved_namespace_pattern: DEFAULT_RESERVED_NAMESPACE_PATTERN.to_string(),
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            own_namespace: None,
            target_label_name: None,
            shutdown_days: DEFAULT_SHUTDOWN_DAYS,
            sentinel_selector_key: DEFAULT_SENTINEL_NODE_SELECTOR_KEY.to_string(),
            sentinel_selector_value: DEFAULT_SENTINEL_NODE_SELECTOR_VALUE.to_string(),
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
            subscriber_annotation_max_bytes: DEFAULT_SUBSCRIBER_ANNOTATION_MAX_BYTES,
            system_actor: system_actor(DEFAULT_SERVICE_ACCOUNT_NAME),
            warning_days: DEFAULT_WARNING_DAYS,
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let service_account =
            env_var_or_default_str("SERVICE_ACCOUNT_NAME", DEFAULT_SERVICE_ACCOUNT_NAME);
        Self {
            reserved_namespace_pattern: env_var_or_default_str(
                "RESERVED_NAMESPACE_PATTERN",
                DEFAULT_RESERVED_NAMESPACE_PATTERN,
            ),
            default_namespace: env_var_or_default_str("DEFAULT_NAMESPACE", DEFAULT_NAMESPACE),
            own_namespace: env_var_opt("POD_NAMESPACE").or_else(|| env_var_opt("NAMESPACE")),
            target_label_name: env_var_opt("TARGET_LABEL_NAME"),
            shutdown_days: validated_shutdown_days(env_var_or_default(
                "SHUTDOWN_DAYS",
                DEFAULT_SHUTDOWN_DAYS,
            )),
            sentinel_selector_key: env_var_or_default_str(
                "SENTINEL_NODE_SELECTOR_KEY",
                DEFAULT_SENTINEL_NODE_SELECTOR_KEY,
            ),
            sentinel_selector_value: env_var_or_default_str(
                "SENTINEL_NODE_SELECTOR_VALUE",
                DEFAULT_SENTINEL_NODE_SELECTOR_VALUE,
            ),
            max_subscribers: env_var_or_default(
                "MAX_SUBSCRIBERS_PER_NAMESPACE",
                DEFAULT_MAX_SUBSCRIBERS,
            ),
            subscriber_annotation_max_bytes: env_var_or_default(
                "SUBSCRIBER_ANNOTATION_MAX_BYTES",
                DEFAULT_SUBSCRIBER_ANNOTATION_MAX_BYTES,
            ),
            system_actor: system_actor(&service_account),
            warning_days: env_var_or_default("WARNING_DAYS", DEFAULT_WARNING_DAYS),
        }
    }

    /// Schedule offset as a chrono duration
    ///
    /// # Errors
    ///
    /// Returns an error when `shutdown_days` is outside the accepted range.
    pub fn shutdown_offset(&self) -> Result<TimeDelta, ShutdownOffsetError> {
        let days = self.shutdown_days;
        if !(MIN_SHUTDOWN_DAYS..=MAX_SHUTDOWN_DAYS).contains(&days) {
            return Err(ShutdownOffsetError::OutOfRange {
                days,
                min: MIN_SHUTDOWN_DAYS,
                max: MAX_SHUTDOWN_DAYS,
            });
        }
        TimeDelta::try_days(days).ok_or(ShutdownOffsetError::Overflow { days })
    }
}

/// Keep `days` when it is a usable offset, otherwise fall back to the default
fn validated_shutdown_days(days: i64) -> i64 {
    if (MIN_SHUTDOWN_DAYS..=MAX_SHUTDOWN_DAYS).contains(&days) {
        days
    } else {
        warn!(
            value = days,
            min = MIN_SHUTDOWN_DAYS,
            max = MAX_SHUTDOWN_DAYS,
            default = DEFAULT_SHUTDOWN_DAYS,
            "SHUTDOWN_DAYS out of range, using default"
        );
        DEFAULT_SHUTDOWN_DAYS
    }
}

/// Identity the job stamps into `next-shutdown-by`
#[must_use]
pub fn system_actor(service_account: &str) -> String {
    format!("serviceaccount/{service_account}")
}
