//! # Runtime
//!
//! Process wiring for the `kube-esg` job.
//!
//! - `initialization`: crypto provider, logging, metrics, Kubernetes client
//! - `run_loop`: single pass (CronJob mode) or interval loop with backoff

pub mod initialization;
pub mod run_loop;

pub use initialization::{initialize, InitializationResult};
pub use run_loop::run;
