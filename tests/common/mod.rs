//! Shared fixtures for the lifecycle integration tests
//!
//! Every test runs against a [`MemoryStore`] seeded with real Kubernetes
//! objects, so patches go through the same JSON-patch semantics as the
//! API server.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use chrono::{DateTime, TimeZone, Utc};
use k8s_openapi::api::apps::v1::{
    DaemonSet, DaemonSetSpec, Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec,
};
use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec};
use k8s_openapi::api::core::v1::{Namespace, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube_esg::config::LifecycleConfig;
use kube_esg::controller::actions::NamespaceActions;
use kube_esg::controller::reconciler::Reconciler;
use kube_esg::controller::store::{ClusterStore, MemoryStore};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const OWN_NAMESPACE: &str = "platform-tools";
pub const SYSTEM_ACTOR: &str = "serviceaccount/shutdown-job";
pub const RUN_TIMESTAMP: &str = "2024-01-08T03:00:00.000Z";

/// Pass start time shared by the tests: 2024-01-08 03:00 UTC
pub fn run_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 3, 0, 0).unwrap()
}

pub fn config() -> LifecycleConfig {
    LifecycleConfig {
        own_namespace: Some(OWN_NAMESPACE.to_string()),
        ..LifecycleConfig::default()
    }
}

pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub fn reconciler(store: &Arc<MemoryStore>, config: LifecycleConfig) -> Reconciler {
    let store: Arc<MemoryStore> = Arc::clone(store);
    let store: Arc<dyn ClusterStore> = store;
    Reconciler::new(store, Arc::new(config)).unwrap()
}

pub fn actions(store: &Arc<MemoryStore>, config: LifecycleConfig) -> NamespaceActions {
    let store: Arc<MemoryStore> = Arc::clone(store);
    let store: Arc<dyn ClusterStore> = store;
    NamespaceActions::new(store, Arc::new(config)).unwrap()
}

fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn meta(namespace: Option<&str>, name: &str, annotations: &[(&str, &str)]) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        annotations: (!annotations.is_empty()).then(|| string_map(annotations)),
        ..ObjectMeta::default()
    }
}

pub fn namespace(name: &str, annotations: &[(&str, &str)]) -> Namespace {
    Namespace {
        metadata: meta(None, name, annotations),
        ..Namespace::default()
    }
}

pub fn labelled_namespace(name: &str, labels: &[(&str, &str)]) -> Namespace {
    let mut ns = namespace(name, &[]);
    ns.metadata.labels = Some(string_map(labels));
    ns
}

pub fn deployment(namespace: &str, name: &str, replicas: Option<i32>) -> Deployment {
    Deployment {
        metadata: meta(Some(namespace), name, &[]),
        spec: Some(DeploymentSpec {
            replicas,
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

pub fn stateful_set(namespace: &str, name: &str, replicas: Option<i32>) -> StatefulSet {
    StatefulSet {
        metadata: meta(Some(namespace), name, &[]),
        spec: Some(StatefulSetSpec {
            replicas,
            ..StatefulSetSpec::default()
        }),
        ..StatefulSet::default()
    }
}

pub fn daemon_set(namespace: &str, name: &str, selector: Option<&[(&str, &str)]>) -> DaemonSet {
    DaemonSet {
        metadata: meta(Some(namespace), name, &[]),
        spec: Some(DaemonSetSpec {
            template: PodTemplateSpec {
                spec: Some(PodSpec {
                    node_selector: selector.map(string_map),
                    ..PodSpec::default()
                }),
                ..PodTemplateSpec::default()
            },
            ..DaemonSetSpec::default()
        }),
        ..DaemonSet::default()
    }
}

pub fn cron_job(namespace: &str, name: &str, suspend: Option<bool>) -> CronJob {
    CronJob {
        metadata: meta(Some(namespace), name, &[]),
        spec: Some(CronJobSpec {
            schedule: "0 * * * *".to_string(),
            suspend,
            ..CronJobSpec::default()
        }),
        ..CronJob::default()
    }
}

/// Seed one workload of every kind, all active
pub fn seed_active_workloads(store: &MemoryStore, ns: &str) {
    store.insert_workload(&deployment(ns, "web", Some(3)));
    store.insert_workload(&stateful_set(ns, "db", Some(2)));
    store.insert_workload(&daemon_set(ns, "agent", Some(&[("disktype", "ssd")])));
    store.insert_workload(&cron_job(ns, "report", None));
}

pub fn namespace_annotations(store: &MemoryStore, name: &str) -> BTreeMap<String, String> {
    store
        .namespace(name)
        .and_then(|ns| ns.metadata.annotations)
        .unwrap_or_default()
}

pub fn replicas(store: &MemoryStore, ns: &str, name: &str) -> Option<i32> {
    store
        .deployment(ns, name)
        .and_then(|d| d.spec)
        .and_then(|s| s.replicas)
}

pub fn annotation<'a>(
    annotations: &'a Option<BTreeMap<String, String>>,
    key: &str,
) -> Option<&'a str> {
    annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}
