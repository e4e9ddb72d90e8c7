//! # Workload Shutdown Strategies
//!
//! Idempotent deactivation of the four workload kinds a namespace can own.
//!
//! | Kind | Active when | Deactivation |
//! |---|---|---|
//! | Deployment | `replicas > 0` | `replicas = 0` |
//! | StatefulSet | `replicas > 0` | `replicas = 0` |
//! | DaemonSet | selector lacks the sentinel pair | sentinel merged into the node selector |
//! | CronJob | `suspend != true` | `suspend = true` |
//!
//! Each deactivation records the pre-patch value and a timestamp on the
//! workload itself so it can be restored later. Workloads that are already
//! inactive are skipped, which keeps repeated passes from rewriting the
//! recorded original.

use crate::config::LifecycleConfig;
use crate::constants::{
    ORIGINAL_NODE_SELECTOR, ORIGINAL_REPLICAS, ORIGINAL_SUSPEND, PREV_SHUTDOWN_AT,
};
use crate::controller::patch::{annotation_path, pointer, PatchSet};
use crate::controller::store::{ClusterStore, StoreError};
use crate::observability::metrics;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Workload kinds managed by the shutdown job
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    CronJob,
}

impl WorkloadKind {
    /// Dispatch table, in the order a namespace is processed
    pub const ALL: [WorkloadKind; 4] = [
        WorkloadKind::Deployment,
        WorkloadKind::StatefulSet,
        WorkloadKind::DaemonSet,
        WorkloadKind::CronJob,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DaemonSet => "DaemonSet",
            WorkloadKind::CronJob => "CronJob",
        }
    }

    /// Annotation holding the value the deactivation overwrote
    #[must_use]
    pub fn original_annotation(self) -> &'static str {
        match self {
            WorkloadKind::Deployment | WorkloadKind::StatefulSet => ORIGINAL_REPLICAS,
            WorkloadKind::DaemonSet => ORIGINAL_NODE_SELECTOR,
            WorkloadKind::CronJob => ORIGINAL_SUSPEND,
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one spec field each kind is deactivated through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadSpec {
    /// Desired replicas (Deployment, StatefulSet); absent replicas default to 1
    Replicas(i32),
    /// Pod template node selector (DaemonSet); `None` when the map is absent
    NodeSelector(Option<BTreeMap<String, String>>),
    /// Suspend flag (CronJob); absent is `false`
    Suspend(bool),
}

/// Node-selector pair no node satisfies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelSelector {
    pub key: String,
    pub value: String,
}

impl SentinelSelector {
    #[must_use]
    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self {
            key: config.sentinel_selector_key.clone(),
            value: config.sentinel_selector_value.clone(),
        }
    }
}

/// The part of a workload the strategies read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRecord {
    pub kind: WorkloadKind,
    /// `None` only for malformed objects, which are skipped
    pub name: Option<String>,
    pub annotations: Option<BTreeMap<String, String>>,
    pub spec: WorkloadSpec,
}

impl WorkloadRecord {
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }

    /// Whether the workload still places pods (or schedules jobs)
    #[must_use]
    pub fn is_active(&self, sentinel: &SentinelSelector) -> bool {
        match &self.spec {
            WorkloadSpec::Replicas(replicas) => *replicas > 0,
            WorkloadSpec::NodeSelector(selector) => {
                selector.as_ref().and_then(|s| s.get(&sentinel.key)) != Some(&sentinel.value)
            }
            WorkloadSpec::Suspend(suspended) => !suspended,
        }
    }

    /// Value recorded under the kind's original-value annotation
    ///
    /// # Errors
    ///
    /// Returns an error if the node selector cannot be serialized.
    pub fn original_value(&self) -> Result<String, serde_json::Error> {
        match &self.spec {
            WorkloadSpec::Replicas(replicas) => Ok(replicas.to_string()),
            WorkloadSpec::NodeSelector(selector) => {
                serde_json::to_string(selector.as_ref().unwrap_or(&BTreeMap::new()))
            }
            WorkloadSpec::Suspend(suspended) => Ok(suspended.to_string()),
        }
    }

    /// Single atomic patch: original value, shutdown timestamp, then the transform
    ///
    /// # Errors
    ///
    /// Returns an error if the original value cannot be serialized.
    pub fn deactivation_patch(
        &self,
        sentinel: &SentinelSelector,
        timestamp: &str,
    ) -> Result<PatchSet, serde_json::Error> {
        let mut patch = PatchSet::for_annotations(self.annotations.is_some());
        patch
            .add(
                annotation_path(self.kind.original_annotation()),
                self.original_value()?,
            )
            .add(annotation_path(PREV_SHUTDOWN_AT), timestamp);

        match &self.spec {
            WorkloadSpec::Replicas(_) => {
                patch.add("/spec/replicas", 0);
            }
            WorkloadSpec::NodeSelector(Some(_)) => {
                patch.add(
                    pointer(&["spec", "template", "spec", "nodeSelector", &sentinel.key]),
                    sentinel.value.as_str(),
                );
            }
            WorkloadSpec::NodeSelector(None) => {
                let selector = serde_json::Map::from_iter([(
                    sentinel.key.clone(),
                    serde_json::Value::String(sentinel.value.clone()),
                )]);
                patch.add("/spec/template/spec/nodeSelector", selector);
            }
            WorkloadSpec::Suspend(_) => {
                patch.add("/spec/suspend", true);
            }
        }
        Ok(patch)
    }
}

/// Deactivate every active workload of one kind in a namespace
///
/// Returns the number of workloads newly deactivated. Listing and patch
/// failures abort this kind only; the caller decides what that means for
/// the namespace.
///
/// # Errors
///
/// Returns the first listing or patch error.
pub async fn shutdown_workloads(
    store: &dyn ClusterStore,
    kind: WorkloadKind,
    namespace: &str,
    sentinel: &SentinelSelector,
    timestamp: &str,
) -> Result<usize, StoreError> {
    let workloads = store.list_workloads(kind, namespace).await?;
    let mut deactivated = 0;

    for workload in &workloads {
        let Some(name) = workload.name.as_deref() else {
            warn!(namespace, kind = %kind, "Skipping workload without a name");
            continue;
        };

        if !workload.is_active(sentinel) {
            debug!(namespace, kind = %kind, workload = name, "Already inactive, skipping");
            continue;
        }

        let patch = workload.deactivation_patch(sentinel, timestamp)?;
        if let Err(e) = store.patch_workload(kind, namespace, name, &patch).await {
            error!(
                namespace,
                kind = %kind,
                workload = name,
                deactivated_before_failure = deactivated,
                error = %e,
                "Failed to deactivate workload"
            );
            return Err(e);
        }

        info!(
            namespace,
            kind = %kind,
            workload = name,
            original = %workload.original_value().unwrap_or_default(),
            "Deactivated workload"
        );
        metrics::increment_workloads_deactivated(kind);
        deactivated += 1;
    }

    Ok(deactivated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sentinel() -> SentinelSelector {
        SentinelSelector {
            key: "kube-esg/shutdown".to_string(),
            value: "true".to_string(),
        }
    }

    fn record(kind: WorkloadKind, spec: WorkloadSpec) -> WorkloadRecord {
        WorkloadRecord {
            kind,
            name: Some("web".to_string()),
            annotations: None,
            spec,
        }
    }

    #[test]
    fn test_replica_kinds_active_above_zero() {
        let s = sentinel();
        assert!(record(WorkloadKind::Deployment, WorkloadSpec::Replicas(3)).is_active(&s));
        assert!(!record(WorkloadKind::StatefulSet, WorkloadSpec::Replicas(0)).is_active(&s));
    }

    #[test]
    fn test_daemonset_active_until_sentinel_present() {
        let s = sentinel();
        assert!(record(WorkloadKind::DaemonSet, WorkloadSpec::NodeSelector(None)).is_active(&s));

        let other_value = BTreeMap::from([("kube-esg/shutdown".to_string(), "false".to_string())]);
        assert!(
            record(WorkloadKind::DaemonSet, WorkloadSpec::NodeSelector(Some(other_value)))
                .is_active(&s)
        );

        let parked = BTreeMap::from([
            ("disktype".to_string(), "ssd".to_string()),
            ("kube-esg/shutdown".to_string(), "true".to_string()),
        ]);
        assert!(
            !record(WorkloadKind::DaemonSet, WorkloadSpec::NodeSelector(Some(parked)))
                .is_active(&s)
        );
    }

    #[test]
    fn test_cronjob_active_unless_suspended() {
        let s = sentinel();
        assert!(record(WorkloadKind::CronJob, WorkloadSpec::Suspend(false)).is_active(&s));
        assert!(!record(WorkloadKind::CronJob, WorkloadSpec::Suspend(true)).is_active(&s));
    }

    #[test]
    fn test_deployment_patch_creates_annotations_then_scales() {
        let patch = record(WorkloadKind::Deployment, WorkloadSpec::Replicas(3))
            .deactivation_patch(&sentinel(), "2024-01-08T03:00:00.000Z")
            .unwrap();

        assert_eq!(
            patch.to_json(),
            json!([
                { "op": "add", "path": "/metadata/annotations", "value": {} },
                { "op": "add", "path": "/metadata/annotations/kube-esg~1original-replicas", "value": "3" },
                { "op": "add", "path": "/metadata/annotations/kube-esg~1prev-shutdown-at", "value": "2024-01-08T03:00:00.000Z" },
                { "op": "add", "path": "/spec/replicas", "value": 0 },
            ])
        );
    }

    #[test]
    fn test_daemonset_patch_merges_into_existing_selector() {
        let mut workload = record(
            WorkloadKind::DaemonSet,
            WorkloadSpec::NodeSelector(Some(BTreeMap::from([(
                "disktype".to_string(),
                "ssd".to_string(),
            )]))),
        );
        workload.annotations = Some(BTreeMap::new());

        let json = workload
            .deactivation_patch(&sentinel(), "ts")
            .unwrap()
            .to_json();

        assert_eq!(json.as_array().unwrap().len(), 3);
        assert_eq!(json[0]["value"], r#"{"disktype":"ssd"}"#);
        assert_eq!(
            json[2]["path"],
            "/spec/template/spec/nodeSelector/kube-esg~1shutdown"
        );
        assert_eq!(json[2]["value"], "true");
    }

    #[test]
    fn test_daemonset_patch_adds_selector_when_absent() {
        let mut workload = record(WorkloadKind::DaemonSet, WorkloadSpec::NodeSelector(None));
        workload.annotations = Some(BTreeMap::new());

        let json = workload
            .deactivation_patch(&sentinel(), "ts")
            .unwrap()
            .to_json();

        assert_eq!(json[0]["value"], "{}");
        assert_eq!(json[2]["path"], "/spec/template/spec/nodeSelector");
        assert_eq!(json[2]["value"], json!({ "kube-esg/shutdown": "true" }));
    }

    #[test]
    fn test_cronjob_records_original_suspend() {
        let json = record(WorkloadKind::CronJob, WorkloadSpec::Suspend(false))
            .deactivation_patch(&sentinel(), "ts")
            .unwrap()
            .to_json();

        assert_eq!(
            json[1],
            json!({ "op": "add", "path": "/metadata/annotations/kube-esg~1original-suspend", "value": "false" })
        );
        assert_eq!(json[3], json!({ "op": "add", "path": "/spec/suspend", "value": true }));
    }
}
