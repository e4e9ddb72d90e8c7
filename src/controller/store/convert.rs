//! # Record Conversion
//!
//! Maps Kubernetes API objects onto the records the lifecycle logic reads.

use crate::controller::store::NamespaceRecord;
use crate::controller::workloads::{WorkloadKind, WorkloadRecord, WorkloadSpec};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{de::DeserializeOwned, Serialize};

/// Kubernetes defaults `spec.replicas` to 1 when unset
const DEFAULT_REPLICAS: i32 = 1;

/// A Kubernetes workload type handled by one strategy
pub trait WorkloadObject: Clone + std::fmt::Debug + Serialize + DeserializeOwned {
    const KIND: WorkloadKind;

    fn meta(&self) -> &ObjectMeta;

    fn spec_field(&self) -> WorkloadSpec;

    fn to_record(&self) -> WorkloadRecord {
        let meta = self.meta();
        WorkloadRecord {
            kind: Self::KIND,
            name: meta.name.clone(),
            annotations: meta.annotations.clone(),
            spec: self.spec_field(),
        }
    }
}

impl WorkloadObject for Deployment {
    const KIND: WorkloadKind = WorkloadKind::Deployment;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn spec_field(&self) -> WorkloadSpec {
        WorkloadSpec::Replicas(
            self.spec
                .as_ref()
                .and_then(|s| s.replicas)
                .unwrap_or(DEFAULT_REPLICAS),
        )
    }
}

impl WorkloadObject for StatefulSet {
    const KIND: WorkloadKind = WorkloadKind::StatefulSet;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn spec_field(&self) -> WorkloadSpec {
        WorkloadSpec::Replicas(
            self.spec
                .as_ref()
                .and_then(|s| s.replicas)
                .unwrap_or(DEFAULT_REPLICAS),
        )
    }
}

impl WorkloadObject for DaemonSet {
    const KIND: WorkloadKind = WorkloadKind::DaemonSet;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn spec_field(&self) -> WorkloadSpec {
        WorkloadSpec::NodeSelector(
            self.spec
                .as_ref()
                .and_then(|s| s.template.spec.as_ref())
                .and_then(|pod| pod.node_selector.clone()),
        )
    }
}

impl WorkloadObject for CronJob {
    const KIND: WorkloadKind = WorkloadKind::CronJob;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn spec_field(&self) -> WorkloadSpec {
        WorkloadSpec::Suspend(
            self.spec
                .as_ref()
                .and_then(|s| s.suspend)
                .unwrap_or(false),
        )
    }
}

/// Convert a namespace, dropping objects that have no name
#[must_use]
pub fn namespace_record(namespace: &Namespace) -> Option<NamespaceRecord> {
    let name = namespace.metadata.name.clone()?;
    Some(NamespaceRecord {
        name,
        labels: namespace.metadata.labels.clone().unwrap_or_default(),
        annotations: namespace.metadata.annotations.clone(),
    })
}
