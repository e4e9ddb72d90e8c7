//! # In-Memory Store
//!
//! A [`ClusterStore`] holding objects as JSON documents and applying patches
//! with the same RFC 6902 semantics as the API server: an `add` below a map
//! that does not exist fails, a `remove` of a missing key fails, and a failed
//! patch leaves the object untouched.
//!
//! Test-only: built under `cfg(test)` or the `test-util` feature, never in
//! the shipped binaries. Fixture insertion panics on malformed input, like
//! any other test helper. Offers failure injection and a patch counter for
//! idempotence checks.

use crate::controller::patch::PatchSet;
use crate::controller::store::convert::{namespace_record, WorkloadObject};
use crate::controller::store::{ClusterStore, NamespaceRecord, StoreError};
use crate::controller::workloads::{WorkloadKind, WorkloadRecord};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::Namespace;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

type WorkloadKey = (WorkloadKind, String, String);

#[derive(Debug, Default)]
struct State {
    namespaces: BTreeMap<String, Value>,
    workloads: BTreeMap<WorkloadKey, Value>,
    fail_namespace_listing: bool,
    failing_listings: BTreeSet<(WorkloadKind, String)>,
    failing_patches: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    patches: AtomicUsize,
    unnamed: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock only happens inside a failing test
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Insert or overwrite a namespace
    ///
    /// # Panics
    ///
    /// Panics if the namespace has no name.
    pub fn insert_namespace(&self, namespace: &Namespace) {
        let name = namespace
            .metadata
            .name
            .clone()
            .expect("namespace fixtures must be named");
        let value = serde_json::to_value(namespace).expect("namespace serializes");
        self.state().namespaces.insert(name, value);
    }

    /// Insert or overwrite a workload. Unnamed workloads get a private key.
    ///
    /// # Panics
    ///
    /// Panics if the workload has no namespace.
    pub fn insert_workload<K: WorkloadObject>(&self, workload: &K) {
        let meta = workload.meta();
        let namespace = meta
            .namespace
            .clone()
            .expect("workload fixtures must carry a namespace");
        let name = meta.name.clone().unwrap_or_else(|| {
            format!("<unnamed-{}>", self.unnamed.fetch_add(1, Ordering::Relaxed))
        });
        let value = serde_json::to_value(workload).expect("workload serializes");
        self.state()
            .workloads
            .insert((K::KIND, namespace, name), value);
    }

    #[must_use]
    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.state()
            .namespaces
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    #[must_use]
    pub fn workload<K: WorkloadObject>(&self, namespace: &str, name: &str) -> Option<K> {
        self.state()
            .workloads
            .get(&(K::KIND, namespace.to_string(), name.to_string()))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    #[must_use]
    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.workload(namespace, name)
    }

    #[must_use]
    pub fn stateful_set(&self, namespace: &str, name: &str) -> Option<StatefulSet> {
        self.workload(namespace, name)
    }

    #[must_use]
    pub fn daemon_set(&self, namespace: &str, name: &str) -> Option<DaemonSet> {
        self.workload(namespace, name)
    }

    #[must_use]
    pub fn cron_job(&self, namespace: &str, name: &str) -> Option<CronJob> {
        self.workload(namespace, name)
    }

    /// Number of patches applied successfully so far
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }

    /// Make the namespace listing fail
    pub fn fail_namespace_listing(&self, fail: bool) {
        self.state().fail_namespace_listing = fail;
    }

    /// Make listing one workload kind in one namespace fail
    pub fn fail_listing(&self, kind: WorkloadKind, namespace: &str) {
        self.state()
            .failing_listings
            .insert((kind, namespace.to_string()));
    }

    /// Make every patch against objects with this name fail
    pub fn fail_patches_for(&self, name: &str) {
        self.state().failing_patches.insert(name.to_string());
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.fail_namespace_listing = false;
        state.failing_listings.clear();
        state.failing_patches.clear();
    }

    fn apply(
        &self,
        document: &mut Value,
        patch: &PatchSet,
        operation: String,
    ) -> Result<(), StoreError> {
        let patch = patch.to_json_patch()?;
        let mut patched = document.clone();
        json_patch::patch(&mut patched, &patch.0).map_err(|e| StoreError::Rejected {
            operation,
            message: e.to_string(),
        })?;
        *document = patched;
        self.patches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn decode<K: DeserializeOwned>(value: &Value, operation: &str) -> Result<K, StoreError> {
    serde_json::from_value(value.clone()).map_err(|e| StoreError::Rejected {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

fn to_record(kind: WorkloadKind, value: &Value) -> Result<WorkloadRecord, StoreError> {
    let operation = format!("decode {kind}");
    Ok(match kind {
        WorkloadKind::Deployment => decode::<Deployment>(value, &operation)?.to_record(),
        WorkloadKind::StatefulSet => decode::<StatefulSet>(value, &operation)?.to_record(),
        WorkloadKind::DaemonSet => decode::<DaemonSet>(value, &operation)?.to_record(),
        WorkloadKind::CronJob => decode::<CronJob>(value, &operation)?.to_record(),
    })
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceRecord>, StoreError> {
        let state = self.state();
        if state.fail_namespace_listing {
            return Err(StoreError::Rejected {
                operation: "list namespaces".to_string(),
                message: "injected failure".to_string(),
            });
        }
        state
            .namespaces
            .values()
            .map(|v| decode::<Namespace>(v, "list namespaces"))
            .filter_map(|r| r.map(|ns| namespace_record(&ns)).transpose())
            .collect()
    }

    async fn get_namespace(&self, name: &str) -> Result<NamespaceRecord, StoreError> {
        let state = self.state();
        let not_found = || StoreError::NotFound {
            kind: "Namespace",
            name: name.to_string(),
        };
        let value = state.namespaces.get(name).ok_or_else(not_found)?;
        namespace_record(&decode::<Namespace>(value, "get namespace")?).ok_or_else(not_found)
    }

    async fn patch_namespace(&self, name: &str, patch: &PatchSet) -> Result<(), StoreError> {
        let mut state = self.state();
        let operation = format!("patch namespace {name}");
        if state.failing_patches.contains(name) {
            return Err(StoreError::Rejected {
                operation,
                message: "injected failure".to_string(),
            });
        }
        let document = state
            .namespaces
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound {
                kind: "Namespace",
                name: name.to_string(),
            })?;
        self.apply(document, patch, operation)
    }

    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        namespace: &str,
    ) -> Result<Vec<WorkloadRecord>, StoreError> {
        let state = self.state();
        if state
            .failing_listings
            .contains(&(kind, namespace.to_string()))
        {
            return Err(StoreError::Rejected {
                operation: format!("list {kind} in {namespace}"),
                message: "injected failure".to_string(),
            });
        }
        state
            .workloads
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
            .map(|(_, value)| to_record(kind, value))
            .collect()
    }

    async fn patch_workload(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
        patch: &PatchSet,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let operation = format!("patch {kind} {namespace}/{name}");
        if state.failing_patches.contains(name) {
            return Err(StoreError::Rejected {
                operation,
                message: "injected failure".to_string(),
            });
        }
        let document = state
            .workloads
            .get_mut(&(kind, namespace.to_string(), name.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                kind: kind.as_str(),
                name: format!("{namespace}/{name}"),
            })?;
        self.apply(document, patch, operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::patch::{annotation_path, ANNOTATIONS_PATH};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn namespace(name: &str) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        }
    }

    #[tokio::test]
    async fn test_add_below_missing_map_is_rejected_atomically() {
        let store = MemoryStore::new();
        store.insert_namespace(&namespace("team-a"));

        let mut patch = PatchSet::new();
        patch.add(annotation_path("kube-esg/next-shutdown-at"), "2024-01-08");
        let result = store.patch_namespace("team-a", &patch).await;

        assert!(matches!(result, Err(StoreError::Rejected { .. })));
        assert_eq!(store.patch_count(), 0);
        assert!(store.namespace("team-a").unwrap().metadata.annotations.is_none());
    }

    #[tokio::test]
    async fn test_map_creation_makes_add_succeed() {
        let store = MemoryStore::new();
        store.insert_namespace(&namespace("team-a"));

        let mut patch = PatchSet::new();
        patch
            .ensure_map(ANNOTATIONS_PATH, false)
            .add(annotation_path("kube-esg/next-shutdown-at"), "2024-01-08");
        store.patch_namespace("team-a", &patch).await.unwrap();

        let record = store.get_namespace("team-a").await.unwrap();
        assert_eq!(
            record.annotation("kube-esg/next-shutdown-at"),
            Some("2024-01-08")
        );
        assert_eq!(store.patch_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_operation_rolls_back_earlier_ones() {
        let store = MemoryStore::new();
        store.insert_namespace(&namespace("team-a"));

        let mut patch = PatchSet::new();
        patch
            .ensure_map(ANNOTATIONS_PATH, false)
            .add(annotation_path("a"), "1")
            .remove(annotation_path("missing"));
        assert!(store.patch_namespace("team-a", &patch).await.is_err());
        assert!(store.namespace("team-a").unwrap().metadata.annotations.is_none());
    }

    #[tokio::test]
    async fn test_missing_namespace_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_namespace("ghost").await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
