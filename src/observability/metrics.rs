//! # Metrics
//!
//! Prometheus metrics for the shutdown job.
//!
//! ## Metrics Exposed
//!
//! - `kube_esg_passes_total` - Total number of reconciliation passes
//! - `kube_esg_pass_failures_total` - Passes aborted because namespaces could not be listed
//! - `kube_esg_pass_duration_seconds` - Duration of a full pass
//! - `kube_esg_namespaces_total` - Namespaces processed, by outcome
//! - `kube_esg_workloads_deactivated_total` - Workloads deactivated, by kind
//! - `kube_esg_strategy_errors_total` - Failed listing or patching of a kind, by kind
//! - `kube_esg_notifications_total` - Notification events emitted, by action
//! - `kube_esg_last_pass_timestamp_seconds` - Unix time of the last completed pass

use crate::controller::lifecycle::NamespaceOutcome;
use crate::controller::notifications::NotificationAction;
use crate::controller::workloads::WorkloadKind;
use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static PASSES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("kube_esg_passes_total", "Total number of reconciliation passes")
        .expect("Failed to create PASSES_TOTAL metric - this should never happen")
});

static PASS_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "kube_esg_pass_failures_total",
        "Total number of passes aborted before processing namespaces",
    )
    .expect("Failed to create PASS_FAILURES_TOTAL metric - this should never happen")
});

static PASS_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "kube_esg_pass_duration_seconds",
            "Duration of a reconciliation pass in seconds",
        )
        .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
    )
    .expect("Failed to create PASS_DURATION metric - this should never happen")
});

static NAMESPACES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_esg_namespaces_total",
            "Total number of namespaces processed by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create NAMESPACES_TOTAL metric - this should never happen")
});

static WORKLOADS_DEACTIVATED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_esg_workloads_deactivated_total",
            "Total number of workloads deactivated by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create WORKLOADS_DEACTIVATED_TOTAL metric - this should never happen")
});

static STRATEGY_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_esg_strategy_errors_total",
            "Total number of failed workload shutdowns by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create STRATEGY_ERRORS_TOTAL metric - this should never happen")
});

static NOTIFICATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_esg_notifications_total",
            "Total number of notification events emitted by action",
        ),
        &["action"],
    )
    .expect("Failed to create NOTIFICATIONS_TOTAL metric - this should never happen")
});

static LAST_PASS_TIMESTAMP: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "kube_esg_last_pass_timestamp_seconds",
        "Unix time of the last completed pass",
    )
    .expect("Failed to create LAST_PASS_TIMESTAMP metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Registration only fails on duplicate registration"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(PASSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PASS_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PASS_DURATION.clone()))?;
    REGISTRY.register(Box::new(NAMESPACES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WORKLOADS_DEACTIVATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STRATEGY_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(NOTIFICATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LAST_PASS_TIMESTAMP.clone()))?;

    Ok(())
}

pub fn increment_passes() {
    PASSES_TOTAL.inc();
}

pub fn increment_pass_failures() {
    PASS_FAILURES_TOTAL.inc();
}

pub fn observe_pass_duration(duration: f64) {
    PASS_DURATION.observe(duration);
}

pub fn set_last_pass_timestamp(unix_secs: i64) {
    LAST_PASS_TIMESTAMP.set(unix_secs);
}

pub fn increment_namespace_outcome(outcome: NamespaceOutcome) {
    NAMESPACES_TOTAL.with_label_values(&[outcome.as_str()]).inc();
}

pub fn increment_workloads_deactivated(kind: WorkloadKind) {
    WORKLOADS_DEACTIVATED_TOTAL
        .with_label_values(&[kind.as_str()])
        .inc();
}

pub fn increment_strategy_errors(kind: WorkloadKind) {
    STRATEGY_ERRORS_TOTAL
        .with_label_values(&[kind.as_str()])
        .inc();
}

pub fn increment_notifications(action: NotificationAction) {
    NOTIFICATIONS_TOTAL
        .with_label_values(&[action.as_str()])
        .inc();
}

/// Render the registry in the Prometheus text format
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_text() -> Result<String> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
