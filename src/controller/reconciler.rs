//! # Reconciler
//!
//! One reconciliation pass: list namespaces, drop the ones the filter
//! excludes, advance each remaining namespace by at most one lifecycle
//! transition, and aggregate the outcome.
//!
//! Only a failed namespace listing aborts a pass. Every other failure stays
//! local to its namespace (or workload kind) and is retried on the next
//! pass through the idempotent state checks.

use crate::config::LifecycleConfig;
use crate::controller::filter::NamespaceFilter;
use crate::controller::lifecycle::{
    reconcile_namespace, KindCounts, LifecycleContext, NamespaceOutcome, NamespaceReport,
    RunClock,
};
use crate::controller::notifications::NotificationEvent;
use crate::controller::store::{ClusterStore, StoreError};
use crate::controller::workloads::SentinelSelector;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, info_span, Instrument};

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to list namespaces: {0}")]
    NamespaceListing(#[source] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceFailure {
    pub namespace: String,
    pub error: String,
}

/// Aggregate result of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: String,
    pub scanned: usize,
    pub skipped: usize,
    pub scheduled: usize,
    pub waiting: usize,
    pub deactivated: usize,
    pub failed: usize,
    pub workloads: KindCounts,
    pub events: Vec<NotificationEvent>,
    pub failures: Vec<NamespaceFailure>,
}

impl RunSummary {
    fn record(&mut self, report: NamespaceReport) {
        match report.outcome {
            NamespaceOutcome::Skipped => self.skipped += 1,
            NamespaceOutcome::Scheduled => self.scheduled += 1,
            NamespaceOutcome::Waiting => self.waiting += 1,
            NamespaceOutcome::Deactivated => self.deactivated += 1,
            NamespaceOutcome::Failed => self.failed += 1,
        }
        metrics::increment_namespace_outcome(report.outcome);

        self.workloads.merge(&report.workloads);
        self.events.extend(report.events);
        if let Some(error) = report.error {
            self.failures.push(NamespaceFailure {
                namespace: report.namespace,
                error,
            });
        }
    }
}

pub struct Reconciler {
    store: Arc<dyn ClusterStore>,
    config: Arc<LifecycleConfig>,
    filter: NamespaceFilter,
    sentinel: SentinelSelector,
    max_concurrent: usize,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Sequential reconciler over `store`
    ///
    /// # Errors
    ///
    /// Returns an error if the reserved namespace pattern is not a valid regex.
    pub fn new(
        store: Arc<dyn ClusterStore>,
        config: Arc<LifecycleConfig>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            filter: NamespaceFilter::from_config(&config)?,
            sentinel: SentinelSelector::from_config(&config),
            store,
            config,
            max_concurrent: 1,
        })
    }

    /// Process up to `max_concurrent` namespaces at once. Values below 1 mean sequential.
    #[must_use]
    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    #[must_use]
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Run one full pass with `now` as the pass start time
    ///
    /// # Errors
    ///
    /// Returns an error only if namespaces cannot be listed.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<RunSummary, ReconcilerError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("reconcile_pass", run_id = %run_id);
        self.run_pass_inner(run_id, now).instrument(span).await
    }

    async fn run_pass_inner(
        &self,
        run_id: String,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, ReconcilerError> {
        let started = Instant::now();
        let clock = RunClock::at(now);
        metrics::increment_passes();
        info!(today = %clock.today, "Starting reconciliation pass");

        let namespaces = self.store.list_namespaces().await.map_err(|e| {
            error!(error = %e, "Failed to list namespaces, aborting pass");
            metrics::increment_pass_failures();
            ReconcilerError::NamespaceListing(e)
        })?;

        let mut summary = RunSummary {
            run_id,
            started_at: clock.timestamp.clone(),
            scanned: namespaces.len(),
            ..RunSummary::default()
        };

        let mut eligible = Vec::new();
        for namespace in namespaces {
            match self.filter.exclusion(&namespace) {
                Some(reason) => {
                    debug!(namespace = %namespace.name, reason = %reason, "Skipping namespace");
                    summary.record(NamespaceReport::new(
                        &namespace.name,
                        NamespaceOutcome::Skipped,
                    ));
                }
                None => eligible.push(namespace),
            }
        }

        let ctx = LifecycleContext {
            store: self.store.as_ref(),
            config: &self.config,
            sentinel: &self.sentinel,
            clock: &clock,
        };
        let mut reports: Vec<NamespaceReport> = stream::iter(eligible)
            .map(|namespace| async move {
                let span = info_span!("namespace", namespace = %namespace.name);
                reconcile_namespace(ctx, &namespace).instrument(span).await
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        reports.sort_by(|a, b| a.namespace.cmp(&b.namespace));

        for report in reports {
            summary.record(report);
        }

        metrics::observe_pass_duration(started.elapsed().as_secs_f64());
        metrics::set_last_pass_timestamp(Utc::now().timestamp());
        info!(
            scanned = summary.scanned,
            skipped = summary.skipped,
            scheduled = summary.scheduled,
            waiting = summary.waiting,
            deactivated = summary.deactivated,
            failed = summary.failed,
            deployments = summary.workloads.deployments,
            stateful_sets = summary.workloads.stateful_sets,
            daemon_sets = summary.workloads.daemon_sets,
            cron_jobs = summary.workloads.cron_jobs,
            notifications = summary.events.len(),
            "Reconciliation pass complete"
        );

        Ok(summary)
    }
}
