//! # Cluster Store
//!
//! Annotations on live objects are the only persistent state of this system.
//! [`ClusterStore`] is the read/patch contract the lifecycle logic runs
//! against:
//!
//! - `kubernetes`: the real cluster, through kube-rs, with a timeout on every call
//! - `memory`: an in-memory cluster applying real RFC 6902 patches, used by
//!   tests and only built with the `test-util` feature
//!
//! Both implementations convert Kubernetes objects into the same records
//! (see `convert`), so the lifecycle logic never touches raw API types.

pub mod convert;
pub mod kubernetes;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use kubernetes::KubeStore;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;

use crate::controller::patch::PatchSet;
use crate::controller::workloads::{WorkloadKind, WorkloadRecord};
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{operation} failed: {source}")]
    Api {
        operation: String,
        #[source]
        source: kube::Error,
    },
    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout {
        operation: String,
        timeout_secs: u64,
    },
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },
    #[error("{operation} rejected: {message}")]
    Rejected { operation: String, message: String },
    #[error("failed to encode patch: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The part of a namespace the lifecycle logic reads
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamespaceRecord {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    /// `None` when the object has no annotation map at all
    pub annotations: Option<BTreeMap<String, String>>,
}

impl NamespaceRecord {
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }

    #[must_use]
    pub fn has_annotation(&self, key: &str) -> bool {
        self.annotation(key).is_some()
    }

    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Read-before-write access to namespaces and their workloads
///
/// Patches are applied atomically per object: a failed patch leaves the
/// object unchanged.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// List all namespaces. Objects without a name are dropped.
    async fn list_namespaces(&self) -> Result<Vec<NamespaceRecord>, StoreError>;

    async fn get_namespace(&self, name: &str) -> Result<NamespaceRecord, StoreError>;

    async fn patch_namespace(&self, name: &str, patch: &PatchSet) -> Result<(), StoreError>;

    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        namespace: &str,
    ) -> Result<Vec<WorkloadRecord>, StoreError>;

    async fn patch_workload(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
        patch: &PatchSet,
    ) -> Result<(), StoreError>;
}
