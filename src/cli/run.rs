//! # Run Command
//!
//! One reconciliation pass against the selected context. Useful for
//! checking what the job would do; it mutates the cluster like the job does.

use crate::{print_json, OutputFormat};
use anyhow::{Context, Result};
use chrono::Utc;
use kube_esg::config::{ControllerConfig, LifecycleConfig};
use kube_esg::controller::reconciler::Reconciler;
use kube_esg::controller::store::ClusterStore;
use std::sync::Arc;

pub async fn run_command(
    store: Arc<dyn ClusterStore>,
    config: Arc<LifecycleConfig>,
    controller_config: &ControllerConfig,
    output: OutputFormat,
) -> Result<()> {
    let reconciler = Reconciler::new(store, config)
        .context("Invalid RESERVED_NAMESPACE_PATTERN")?
        .with_concurrency(controller_config.max_concurrent_namespaces);
    let summary = reconciler
        .run_pass(Utc::now())
        .await
        .context("Reconciliation pass failed")?;

    if output == OutputFormat::Json {
        return print_json(&summary);
    }

    println!("Run {} at {}", summary.run_id, summary.started_at);
    println!(
        "\n{:<12} {:<10} {:<12} {:<10} {:<12} {:<10}",
        "SCANNED", "SKIPPED", "SCHEDULED", "WAITING", "DEACTIVATED", "FAILED"
    );
    println!(
        "{:<12} {:<10} {:<12} {:<10} {:<12} {:<10}",
        summary.scanned,
        summary.skipped,
        summary.scheduled,
        summary.waiting,
        summary.deactivated,
        summary.failed
    );
    println!(
        "\nWorkloads deactivated: {} deployments, {} statefulsets, {} daemonsets, {} cronjobs",
        summary.workloads.deployments,
        summary.workloads.stateful_sets,
        summary.workloads.daemon_sets,
        summary.workloads.cron_jobs
    );
    for failure in &summary.failures {
        println!("❌ {}: {}", failure.namespace, failure.error);
    }
    Ok(())
}
