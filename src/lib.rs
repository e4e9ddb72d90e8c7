//! # kube-esg
//!
//! Time-boxed lifecycle for ephemeral Kubernetes namespaces.
//!
//! Every managed namespace gets a deactivation deadline. Users can push the
//! deadline out; once it has passed, the job scales Deployments and
//! StatefulSets to zero, parks DaemonSets on an unsatisfiable node selector
//! and suspends CronJobs, recording the original values so the namespace
//! can be restored. Nothing is deleted.
//!
//! All state lives in annotations on the namespaces and workloads
//! themselves, so every pass re-derives what to do from live objects and
//! can be re-run at any time.

pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod runtime;
