//! # Kubernetes Store
//!
//! [`ClusterStore`] backed by the Kubernetes API through kube-rs.
//!
//! Every call is bounded by a timeout so a stalled API server degrades into a
//! per-namespace failure instead of hanging the pass.

use crate::controller::patch::PatchSet;
use crate::controller::store::convert::{namespace_record, WorkloadObject};
use crate::controller::store::{ClusterStore, NamespaceRecord, StoreError};
use crate::controller::workloads::{WorkloadKind, WorkloadRecord};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, Resource};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Field manager recorded on every patch
pub const FIELD_MANAGER: &str = "kube-esg";

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    timeout: Duration,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn call<T, F>(&self, operation: String, request: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(StoreError::Api { operation, source }),
            Err(_elapsed) => Err(StoreError::Timeout {
                operation,
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn list_kind<K>(&self, namespace: &str) -> Result<Vec<WorkloadRecord>, StoreError>
    where
        K: WorkloadObject + Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = self
            .call(
                format!("list {} in {namespace}", <K as WorkloadObject>::KIND),
                api.list(&ListParams::default()),
            )
            .await?;
        Ok(list.items.iter().map(WorkloadObject::to_record).collect())
    }

    async fn patch_kind<K>(
        &self,
        namespace: &str,
        name: &str,
        patch: json_patch::Patch,
    ) -> Result<(), StoreError>
    where
        K: WorkloadObject + Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        self.call(
            format!("patch {} {namespace}/{name}", <K as WorkloadObject>::KIND),
            api.patch(
                name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Json::<()>(patch),
            ),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceRecord>, StoreError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = self
            .call("list namespaces".to_string(), api.list(&ListParams::default()))
            .await?;
        Ok(list.items.iter().filter_map(namespace_record).collect())
    }

    async fn get_namespace(&self, name: &str) -> Result<NamespaceRecord, StoreError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let result = self.call(format!("get namespace {name}"), api.get(name)).await;
        match result {
            Ok(namespace) => namespace_record(&namespace).ok_or_else(|| StoreError::NotFound {
                kind: "Namespace",
                name: name.to_string(),
            }),
            Err(StoreError::Api {
                source: kube::Error::Api(e),
                ..
            }) if e.code == 404 => Err(StoreError::NotFound {
                kind: "Namespace",
                name: name.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn patch_namespace(&self, name: &str, patch: &PatchSet) -> Result<(), StoreError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        debug!(namespace = name, patch = %patch.to_json(), "Patching namespace");
        self.call(
            format!("patch namespace {name}"),
            api.patch(
                name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Json::<()>(patch.to_json_patch()?),
            ),
        )
        .await?;
        Ok(())
    }

    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        namespace: &str,
    ) -> Result<Vec<WorkloadRecord>, StoreError> {
        match kind {
            WorkloadKind::Deployment => self.list_kind::<Deployment>(namespace).await,
            WorkloadKind::StatefulSet => self.list_kind::<StatefulSet>(namespace).await,
            WorkloadKind::DaemonSet => self.list_kind::<DaemonSet>(namespace).await,
            WorkloadKind::CronJob => self.list_kind::<CronJob>(namespace).await,
        }
    }

    async fn patch_workload(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
        patch: &PatchSet,
    ) -> Result<(), StoreError> {
        debug!(namespace, kind = %kind, workload = name, patch = %patch.to_json(), "Patching workload");
        let patch = patch.to_json_patch()?;
        match kind {
            WorkloadKind::Deployment => self.patch_kind::<Deployment>(namespace, name, patch).await,
            WorkloadKind::StatefulSet => {
                self.patch_kind::<StatefulSet>(namespace, name, patch).await
            }
            WorkloadKind::DaemonSet => self.patch_kind::<DaemonSet>(namespace, name, patch).await,
            WorkloadKind::CronJob => self.patch_kind::<CronJob>(namespace, name, patch).await,
        }
    }
}
