//! # Constants
//!
//! Annotation keys and defaults shared by the job, the CLI and the tests.
//!
//! Every key lives under the `kube-esg/` prefix. The keys and the value
//! shapes stored under them are the persisted state of the system and are
//! read by the dashboard, so they must not change.

/// Scheduled deactivation date (`YYYY-MM-DD`)
pub const NEXT_SHUTDOWN_AT: &str = "kube-esg/next-shutdown-at";

/// Actor that last set the schedule
pub const NEXT_SHUTDOWN_BY: &str = "kube-esg/next-shutdown-by";

/// Timestamp of the most recent completed deactivation.
/// Written on namespaces and on every workload that was deactivated.
pub const PREV_SHUTDOWN_AT: &str = "kube-esg/prev-shutdown-at";

/// JSON array of actors who asked to be notified
pub const SHUTDOWN_SUBSCRIBERS: &str = "kube-esg/shutdown-subscribers";

/// Replica count before deactivation (Deployments, StatefulSets)
pub const ORIGINAL_REPLICAS: &str = "kube-esg/original-replicas";

/// Node selector before deactivation, JSON encoded (DaemonSets)
pub const ORIGINAL_NODE_SELECTOR: &str = "kube-esg/original-node-selector";

/// Suspend flag before deactivation (CronJobs)
pub const ORIGINAL_SUSPEND: &str = "kube-esg/original-suspend";

/// Default regex for reserved system namespaces
pub const DEFAULT_RESERVED_NAMESPACE_PATTERN: &str = "^kube-";

/// Literal name of the cluster default namespace
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default number of days between scheduling and deactivation
pub const DEFAULT_SHUTDOWN_DAYS: i64 = 7;

/// Smallest accepted schedule offset (days). Zero or less would stamp a deadline already due.
pub const MIN_SHUTDOWN_DAYS: i64 = 1;

/// Largest accepted schedule offset (days)
pub const MAX_SHUTDOWN_DAYS: i64 = 3650;

/// Default sentinel node-selector key. No real node carries labels in our prefix.
pub const DEFAULT_SENTINEL_NODE_SELECTOR_KEY: &str = "kube-esg/shutdown";

/// Default sentinel node-selector value
pub const DEFAULT_SENTINEL_NODE_SELECTOR_VALUE: &str = "true";

/// Default maximum number of subscribers per namespace
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 10;

/// Practical budget for a single annotation value (bytes)
pub const DEFAULT_SUBSCRIBER_ANNOTATION_MAX_BYTES: usize = 1000;

/// Default service account used to build the system actor identity
pub const DEFAULT_SERVICE_ACCOUNT_NAME: &str = "shutdown-job";

/// Default warning window for subscriber notifications (days)
pub const DEFAULT_WARNING_DAYS: i64 = 1;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default timeout for a single Kubernetes API call (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default interval between passes in loop mode. 0 runs a single pass.
pub const DEFAULT_RUN_INTERVAL_SECS: u64 = 0;

/// Default retry backoff after a failed pass in loop mode (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 30;

/// Maximum retry backoff after a failed pass in loop mode (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 600;
