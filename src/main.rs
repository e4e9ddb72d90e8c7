//! # kube-esg
//!
//! Namespace lifecycle job. Runs one reconciliation pass and exits, or with
//! `RUN_INTERVAL_SECS` set, runs a pass per interval while serving metrics
//! and probes.

use anyhow::Result;
use kube_esg::runtime;

#[tokio::main]
async fn main() -> Result<()> {
    let init = runtime::initialize().await?;
    runtime::run(init).await
}
