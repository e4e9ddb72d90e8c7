//! # Lifecycle
//!
//! Per-namespace state machine driven by the schedule annotations:
//!
//! | State | Condition | Action |
//! |---|---|---|
//! | Unscheduled | `next-shutdown-at` absent | stamp today + offset and the system actor |
//! | Malformed | `next-shutdown-at` not a date | re-stamp as if unscheduled |
//! | Pending | deadline >= today | no-op, maybe a warning event |
//! | Due | deadline < today | deactivate every kind, then record completion |
//!
//! A due namespace whose deactivation fails for any kind keeps its schedule
//! annotations, so the next pass retries the remaining work. Workloads that
//! were already deactivated are skipped by their own active check.

use crate::config::{LifecycleConfig, ShutdownOffsetError};
use crate::constants::{NEXT_SHUTDOWN_AT, NEXT_SHUTDOWN_BY, PREV_SHUTDOWN_AT, SHUTDOWN_SUBSCRIBERS};
use crate::controller::notifications::{self, NotificationAction, NotificationEvent};
use crate::controller::patch::{annotation_path, PatchSet};
use crate::controller::store::{ClusterStore, NamespaceRecord};
use crate::controller::subscribers;
use crate::controller::workloads::{shutdown_workloads, SentinelSelector, WorkloadKind};
use crate::observability::metrics;
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeDelta, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The notion of "now" shared by every namespace in one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunClock {
    pub now: DateTime<Utc>,
    /// Calendar day (UTC) used for all deadline comparisons
    pub today: NaiveDate,
    /// Completion timestamp written to `prev-shutdown-at`
    pub timestamp: String,
}

impl RunClock {
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            today: now.date_naive(),
            timestamp: format_timestamp(now),
        }
    }

    /// Deadline `offset` after today, `None` past the end of the calendar
    #[must_use]
    pub fn deadline(&self, offset: TimeDelta) -> Option<NaiveDate> {
        self.today.checked_add_signed(offset)
    }

    /// Deadline for a namespace scheduled during this pass
    ///
    /// # Errors
    ///
    /// Returns an error when the configured offset is unusable.
    pub fn scheduled_deadline(
        &self,
        config: &LifecycleConfig,
    ) -> Result<NaiveDate, ShutdownOffsetError> {
        let offset = config.shutdown_offset()?;
        self.deadline(offset).ok_or(ShutdownOffsetError::Overflow {
            days: config.shutdown_days,
        })
    }
}

#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// RFC 3339, millisecond precision, `Z` suffix
#[must_use]
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a deadline annotation. Full timestamps are accepted and truncated to their date.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc).date_naive())
    })
}

/// Schedule state derived from a namespace's annotations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleState {
    Unscheduled,
    Malformed(String),
    Pending(NaiveDate),
    Due(NaiveDate),
}

impl ScheduleState {
    #[must_use]
    pub fn of(namespace: &NamespaceRecord, today: NaiveDate) -> Self {
        match namespace.annotation(NEXT_SHUTDOWN_AT) {
            None => ScheduleState::Unscheduled,
            Some(raw) => match parse_date(raw) {
                None => ScheduleState::Malformed(raw.to_string()),
                Some(date) if date < today => ScheduleState::Due(date),
                Some(date) => ScheduleState::Pending(date),
            },
        }
    }
}

/// Set the deadline and the actor, replacing whatever is there.
/// Used for initial scheduling and for extensions.
#[must_use]
pub fn schedule_patch(namespace: &NamespaceRecord, deadline: NaiveDate, actor: &str) -> PatchSet {
    let mut patch = PatchSet::for_annotations(namespace.annotations.is_some());
    patch
        .upsert(
            annotation_path(NEXT_SHUTDOWN_AT),
            format_date(deadline),
            namespace.has_annotation(NEXT_SHUTDOWN_AT),
        )
        .upsert(
            annotation_path(NEXT_SHUTDOWN_BY),
            actor,
            namespace.has_annotation(NEXT_SHUTDOWN_BY),
        );
    patch
}

/// Record completion and clear the schedule
#[must_use]
pub fn completion_patch(namespace: &NamespaceRecord, timestamp: &str) -> PatchSet {
    let mut patch = PatchSet::for_annotations(namespace.annotations.is_some());
    patch.upsert(
        annotation_path(PREV_SHUTDOWN_AT),
        timestamp,
        namespace.has_annotation(PREV_SHUTDOWN_AT),
    );
    if namespace.has_annotation(NEXT_SHUTDOWN_AT) {
        patch.remove(annotation_path(NEXT_SHUTDOWN_AT));
    }
    if namespace.has_annotation(NEXT_SHUTDOWN_BY) {
        patch.remove(annotation_path(NEXT_SHUTDOWN_BY));
    }
    patch
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceOutcome {
    Skipped,
    Scheduled,
    Waiting,
    Deactivated,
    Failed,
}

impl NamespaceOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NamespaceOutcome::Skipped => "skipped",
            NamespaceOutcome::Scheduled => "scheduled",
            NamespaceOutcome::Waiting => "waiting",
            NamespaceOutcome::Deactivated => "deactivated",
            NamespaceOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for NamespaceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workloads newly deactivated, per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindCounts {
    pub deployments: usize,
    pub stateful_sets: usize,
    pub daemon_sets: usize,
    pub cron_jobs: usize,
}

impl KindCounts {
    pub fn add(&mut self, kind: WorkloadKind, count: usize) {
        match kind {
            WorkloadKind::Deployment => self.deployments += count,
            WorkloadKind::StatefulSet => self.stateful_sets += count,
            WorkloadKind::DaemonSet => self.daemon_sets += count,
            WorkloadKind::CronJob => self.cron_jobs += count,
        }
    }

    #[must_use]
    pub fn get(&self, kind: WorkloadKind) -> usize {
        match kind {
            WorkloadKind::Deployment => self.deployments,
            WorkloadKind::StatefulSet => self.stateful_sets,
            WorkloadKind::DaemonSet => self.daemon_sets,
            WorkloadKind::CronJob => self.cron_jobs,
        }
    }

    pub fn merge(&mut self, other: &KindCounts) {
        for kind in WorkloadKind::ALL {
            self.add(kind, other.get(kind));
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.deployments + self.stateful_sets + self.daemon_sets + self.cron_jobs
    }
}

/// What happened to one namespace in one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceReport {
    pub namespace: String,
    pub outcome: NamespaceOutcome,
    pub workloads: KindCounts,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<NotificationEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NamespaceReport {
    #[must_use]
    pub fn new(namespace: &str, outcome: NamespaceOutcome) -> Self {
        Self {
            namespace: namespace.to_string(),
            outcome,
            workloads: KindCounts::default(),
            events: Vec::new(),
            error: None,
        }
    }

    fn failed(namespace: &str, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(namespace, NamespaceOutcome::Failed)
        }
    }
}

/// Everything a namespace transition needs besides the namespace itself
#[derive(Clone, Copy)]
pub struct LifecycleContext<'a> {
    pub store: &'a dyn ClusterStore,
    pub config: &'a LifecycleConfig,
    pub sentinel: &'a SentinelSelector,
    pub clock: &'a RunClock,
}

impl fmt::Debug for LifecycleContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleContext")
            .field("config", &self.config)
            .field("sentinel", &self.sentinel)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// Advance one eligible namespace by at most one transition
///
/// Never returns an error: failures are reported through the outcome and
/// left for the next pass.
pub async fn reconcile_namespace(
    ctx: LifecycleContext<'_>,
    namespace: &NamespaceRecord,
) -> NamespaceReport {
    let name = namespace.name.as_str();

    match ScheduleState::of(namespace, ctx.clock.today) {
        ScheduleState::Unscheduled => schedule(ctx, namespace).await,
        ScheduleState::Malformed(raw) => {
            warn!(namespace = name, value = %raw, "Malformed shutdown date, rescheduling");
            schedule(ctx, namespace).await
        }
        ScheduleState::Pending(deadline) => {
            debug!(namespace = name, deadline = %deadline, "Shutdown not due yet");
            let mut report = NamespaceReport::new(name, NamespaceOutcome::Waiting);
            let days_left = (deadline - ctx.clock.today).num_days();
            if let Some(action) = notifications::pending_action(days_left, ctx.config.warning_days)
            {
                report.events.extend(notify(ctx, namespace, deadline, action));
            }
            report
        }
        ScheduleState::Due(deadline) => shutdown(ctx, namespace, deadline).await,
    }
}

async fn schedule(ctx: LifecycleContext<'_>, namespace: &NamespaceRecord) -> NamespaceReport {
    let name = namespace.name.as_str();
    let deadline = match ctx.clock.scheduled_deadline(ctx.config) {
        Ok(deadline) => deadline,
        Err(e) => {
            error!(namespace = name, error = %e, "Cannot compute shutdown deadline");
            return NamespaceReport::failed(name, e.to_string());
        }
    };
    let patch = schedule_patch(namespace, deadline, &ctx.config.system_actor);

    match ctx.store.patch_namespace(name, &patch).await {
        Ok(()) => {
            info!(
                namespace = name,
                deadline = %format_date(deadline),
                actor = %ctx.config.system_actor,
                "Scheduled namespace shutdown"
            );
            NamespaceReport::new(name, NamespaceOutcome::Scheduled)
        }
        Err(e) => {
            error!(namespace = name, error = %e, "Failed to schedule namespace shutdown");
            NamespaceReport::failed(name, e.to_string())
        }
    }
}

async fn shutdown(
    ctx: LifecycleContext<'_>,
    namespace: &NamespaceRecord,
    deadline: NaiveDate,
) -> NamespaceReport {
    let name = namespace.name.as_str();
    info!(namespace = name, deadline = %deadline, "Shutdown due, deactivating workloads");

    let mut counts = KindCounts::default();
    let mut failed_kinds = Vec::new();
    for kind in WorkloadKind::ALL {
        match shutdown_workloads(ctx.store, kind, name, ctx.sentinel, &ctx.clock.timestamp).await {
            Ok(count) => counts.add(kind, count),
            Err(e) => {
                error!(namespace = name, kind = %kind, error = %e, "Workload shutdown failed");
                metrics::increment_strategy_errors(kind);
                failed_kinds.push(kind.as_str());
            }
        }
    }

    if !failed_kinds.is_empty() {
        warn!(
            namespace = name,
            failed_kinds = ?failed_kinds,
            "Shutdown incomplete, keeping schedule for the next run"
        );
        return NamespaceReport {
            workloads: counts,
            ..NamespaceReport::failed(
                name,
                format!("shutdown failed for {}", failed_kinds.join(", ")),
            )
        };
    }

    let patch = completion_patch(namespace, &ctx.clock.timestamp);
    if let Err(e) = ctx.store.patch_namespace(name, &patch).await {
        error!(namespace = name, error = %e, "Failed to record namespace shutdown");
        return NamespaceReport {
            workloads: counts,
            ..NamespaceReport::failed(name, e.to_string())
        };
    }

    info!(
        namespace = name,
        deployments = counts.deployments,
        stateful_sets = counts.stateful_sets,
        daemon_sets = counts.daemon_sets,
        cron_jobs = counts.cron_jobs,
        "Namespace shutdown complete"
    );
    let mut report = NamespaceReport::new(name, NamespaceOutcome::Deactivated);
    report.workloads = counts;
    report.events.extend(notify(
        ctx,
        namespace,
        deadline,
        NotificationAction::ShutdownCompleted,
    ));
    report
}

fn notify(
    ctx: LifecycleContext<'_>,
    namespace: &NamespaceRecord,
    deadline: NaiveDate,
    action: NotificationAction,
) -> Option<NotificationEvent> {
    let subscribers =
        subscribers::parse_or_empty(&namespace.name, namespace.annotation(SHUTDOWN_SUBSCRIBERS));
    notifications::notify(&namespace.name, &subscribers, deadline, action, ctx.clock.now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn namespace(annotations: &[(&str, &str)]) -> NamespaceRecord {
        NamespaceRecord {
            name: "team-a".to_string(),
            labels: BTreeMap::new(),
            annotations: Some(
                annotations
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_clock_pins_day_and_timestamp() {
        let clock = RunClock::at(Utc.with_ymd_and_hms(2024, 1, 8, 23, 59, 59).unwrap());
        assert_eq!(clock.today, date(2024, 1, 8));
        assert_eq!(clock.timestamp, "2024-01-08T23:59:59.000Z");
        assert_eq!(clock.deadline(TimeDelta::days(7)), Some(date(2024, 1, 15)));
        assert_eq!(clock.deadline(TimeDelta::MAX), None);
    }

    #[test]
    fn test_scheduled_deadline_rejects_unusable_offsets() {
        let clock = RunClock::at(Utc.with_ymd_and_hms(2024, 1, 8, 3, 0, 0).unwrap());
        let config = |days| LifecycleConfig {
            shutdown_days: days,
            ..LifecycleConfig::default()
        };

        assert_eq!(clock.scheduled_deadline(&config(7)), Ok(date(2024, 1, 15)));
        assert!(matches!(
            clock.scheduled_deadline(&config(100_000_000)),
            Err(ShutdownOffsetError::OutOfRange { .. })
        ));
        assert!(matches!(
            clock.scheduled_deadline(&config(-3)),
            Err(ShutdownOffsetError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(parse_date("2024-01-01"), Some(date(2024, 1, 1)));
        assert_eq!(parse_date("2024-01-01T10:00:00Z"), Some(date(2024, 1, 1)));
        assert_eq!(parse_date("next tuesday"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_state_derivation_compares_days() {
        let today = date(2024, 1, 8);
        let state = |v: &str| ScheduleState::of(&namespace(&[(NEXT_SHUTDOWN_AT, v)]), today);

        assert_eq!(
            ScheduleState::of(&namespace(&[]), today),
            ScheduleState::Unscheduled
        );
        assert_eq!(state("2024-01-07"), ScheduleState::Due(date(2024, 1, 7)));
        assert_eq!(state("2024-01-08"), ScheduleState::Pending(date(2024, 1, 8)));
        assert_eq!(state("2024-01-09"), ScheduleState::Pending(date(2024, 1, 9)));
        assert_eq!(state("soon"), ScheduleState::Malformed("soon".to_string()));
    }

    #[test]
    fn test_schedule_patch_adds_when_absent() {
        let mut ns = namespace(&[]);
        ns.annotations = None;
        let patch = schedule_patch(&ns, date(2024, 1, 15), "serviceaccount/shutdown-job");

        assert_eq!(
            patch.to_json(),
            json!([
                { "op": "add", "path": "/metadata/annotations", "value": {} },
                { "op": "add", "path": "/metadata/annotations/kube-esg~1next-shutdown-at", "value": "2024-01-15" },
                { "op": "add", "path": "/metadata/annotations/kube-esg~1next-shutdown-by", "value": "serviceaccount/shutdown-job" },
            ])
        );
    }

    #[test]
    fn test_schedule_patch_replaces_when_present() {
        let ns = namespace(&[
            (NEXT_SHUTDOWN_AT, "2024-01-01"),
            (NEXT_SHUTDOWN_BY, "serviceaccount/shutdown-job"),
        ]);
        let json = schedule_patch(&ns, date(2024, 1, 15), "alice@example.com").to_json();

        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["op"], "replace");
        assert_eq!(json[1]["op"], "replace");
        assert_eq!(json[1]["value"], "alice@example.com");
    }

    #[test]
    fn test_completion_patch_clears_schedule() {
        let ns = namespace(&[(NEXT_SHUTDOWN_AT, "2024-01-01")]);
        let json = completion_patch(&ns, "2024-01-08T03:00:00.000Z").to_json();

        assert_eq!(
            json,
            json!([
                { "op": "add", "path": "/metadata/annotations/kube-esg~1prev-shutdown-at", "value": "2024-01-08T03:00:00.000Z" },
                { "op": "remove", "path": "/metadata/annotations/kube-esg~1next-shutdown-at" },
            ])
        );
    }

    #[test]
    fn test_kind_counts_merge() {
        let mut a = KindCounts::default();
        a.add(WorkloadKind::Deployment, 2);
        let mut b = KindCounts::default();
        b.add(WorkloadKind::CronJob, 1);
        b.add(WorkloadKind::Deployment, 1);
        a.merge(&b);

        assert_eq!(a.deployments, 3);
        assert_eq!(a.cron_jobs, 1);
        assert_eq!(a.total(), 4);
    }
}
