//! # Controller
//!
//! Namespace lifecycle logic, leaf modules first:
//!
//! - `patch`: JSON patch operations and RFC 6901 pointers
//! - `store`: read/patch contract over live cluster objects
//! - `filter`: which namespaces are managed
//! - `workloads`: per-kind deactivation strategies
//! - `subscribers`: bounded subscriber list stored in an annotation
//! - `notifications`: warning, imminent and completed events
//! - `lifecycle`: per-namespace state machine
//! - `reconciler`: one pass over all namespaces
//! - `actions`: extend, subscribe, unsubscribe and the read model
//! - `backoff`: Fibonacci backoff for loop-mode retries
//! - `server`: HTTP server for metrics and health checks

pub mod actions;
pub mod backoff;
pub mod filter;
pub mod lifecycle;
pub mod notifications;
pub mod patch;
pub mod reconciler;
pub mod server;
pub mod store;
pub mod subscribers;
pub mod workloads;
